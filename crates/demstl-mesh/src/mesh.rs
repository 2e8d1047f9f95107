//! Turning a filled [`ElevationGrid`] into a closed STL solid.
//!
//! The solid is the terrain surface over the grid, four side walls dropping
//! to z = 0, and a flat base. Triangles are emitted in a fixed order:
//!
//! 1. for each row after the first: the west wall pair, the surface quads
//!    west to east, then the east wall pair;
//! 2. for each column after the first: the north wall pair, then the south
//!    wall pair;
//! 3. the two base triangles.
//!
//! Every facet is wound so its normal points out of the solid.

use crate::grid::{ElevationCell, ElevationGrid};
use crate::settings::{ExtractSettings, NormalMode};
use crate::stl::{StlWriter, Triangle, Vertex, DEFAULT_HEADER};
use crate::{MeshError, Result};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Number of triangles in the solid for a `rows × cols` grid, or `None` if
/// it does not fit a `u32`.
pub fn triangle_count(rows: usize, cols: usize) -> Option<u32> {
    if rows == 0 || cols == 0 {
        return Some(0);
    }
    let (r, c) = (rows as u64 - 1, cols as u64 - 1);
    let top = r.checked_mul(c)?.checked_mul(2)?;
    let sides = r.checked_add(c)?.checked_mul(4)?;
    let count = top.checked_add(sides)?.checked_add(2)?;
    u32::try_from(count).ok()
}

/// Maps elevations to solid thickness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightScale {
    min_elevation: f64,
    max_elevation: f64,
    base_thickness: f64,
    slope: f64,
}

impl HeightScale {
    /// Map `min_elevation` to `base_thickness` and `max_elevation` to
    /// `thickness`. A flat range maps everything to `base_thickness`.
    pub fn new(min_elevation: f64, max_elevation: f64, base_thickness: f64, thickness: f64) -> Self {
        let range = max_elevation - min_elevation;
        let slope = if range != 0.0 {
            (thickness - base_thickness) / range
        } else {
            0.0
        };
        Self {
            min_elevation,
            max_elevation,
            base_thickness,
            slope,
        }
    }

    /// Scale for `settings`, using the `observed` elevation range when auto
    /// scaling and the configured altitudes otherwise.
    pub fn from_settings(settings: &ExtractSettings, observed: Option<(f32, f32)>) -> Self {
        let observed = observed.filter(|_| settings.auto_scale_thickness);
        let min = observed.map_or(settings.min_altitude, |(min, _)| f64::from(min));
        let max = observed.map_or(settings.max_altitude, |(_, max)| f64::from(max));
        Self::new(min, max, settings.base_thickness, settings.thickness)
    }

    /// Elevation mapped to the base thickness.
    pub fn min_elevation(&self) -> f64 {
        self.min_elevation
    }

    /// Elevation mapped to the full thickness.
    pub fn max_elevation(&self) -> f64 {
        self.max_elevation
    }

    /// Thickness per unit of elevation.
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Thickness at `elevation`; the base thickness when there is none.
    pub fn height(&self, elevation: Option<f32>) -> f32 {
        match elevation {
            Some(e) => (self.base_thickness + self.slope * (f64::from(e) - self.min_elevation)) as f32,
            None => self.base_thickness as f32,
        }
    }

    /// Surface height of a cell. Baseline cells sit at the base thickness.
    pub fn cell_height(&self, cell: &ElevationCell) -> f32 {
        if cell.use_baseline() {
            self.base_thickness as f32
        } else {
            self.height(cell.elevation())
        }
    }
}

/// Emits the triangles of the solid for a grid.
pub struct MeshBuilder<'a> {
    grid: &'a ElevationGrid,
    scale: HeightScale,
    normals: NormalMode,
}

impl<'a> MeshBuilder<'a> {
    pub fn new(grid: &'a ElevationGrid, scale: HeightScale, normals: NormalMode) -> Self {
        Self {
            grid,
            scale,
            normals,
        }
    }

    /// Height scale in use.
    pub fn scale(&self) -> HeightScale {
        self.scale
    }

    /// Number of triangles [`Self::for_each_triangle`] emits.
    pub fn triangle_count(&self) -> Result<u32> {
        triangle_count(self.grid.rows(), self.grid.cols()).ok_or(MeshError::TooManyTriangles {
            rows: self.grid.rows(),
            cols: self.grid.cols(),
        })
    }

    fn top(&self, row: usize, col: usize) -> Vertex {
        let cell = self.grid.cell(row, col);
        Vertex::new(cell.x(), cell.y(), self.scale.cell_height(cell))
    }

    fn base(&self, row: usize, col: usize) -> Vertex {
        let cell = self.grid.cell(row, col);
        Vertex::new(cell.x(), cell.y(), 0.0)
    }

    fn triangle(&self, v1: Vertex, v2: Vertex, v3: Vertex) -> Triangle {
        let triangle = Triangle::new(v1, v2, v3);
        match self.normals {
            NormalMode::Raw => triangle,
            NormalMode::Unit => triangle.with_unit_normal(),
        }
    }

    /// Call `f` with every triangle of the solid, in file order.
    ///
    /// Stops at the first error `f` returns.
    pub fn for_each_triangle<E, F>(&self, mut f: F) -> std::result::Result<(), E>
    where
        F: FnMut(Triangle) -> std::result::Result<(), E>,
    {
        let rows = self.grid.rows();
        let cols = self.grid.cols();

        for row in 1..rows {
            // West wall
            let top = self.top(row, 0);
            let bottom = self.top(row - 1, 0);
            let base_top = self.base(row, 0);
            let base_bottom = self.base(row - 1, 0);
            f(self.triangle(top, base_top, base_bottom))?;
            f(self.triangle(top, base_bottom, bottom))?;

            // Surface
            for col in 1..cols {
                let top_left = self.top(row, col - 1);
                let bottom_left = self.top(row - 1, col - 1);
                let top_right = self.top(row, col);
                let bottom_right = self.top(row - 1, col);
                f(self.triangle(top_left, bottom_right, top_right))?;
                f(self.triangle(top_left, bottom_left, bottom_right))?;
            }

            // East wall
            let top = self.top(row, cols - 1);
            let bottom = self.top(row - 1, cols - 1);
            let base_top = self.base(row, cols - 1);
            let base_bottom = self.base(row - 1, cols - 1);
            f(self.triangle(top, base_bottom, base_top))?;
            f(self.triangle(top, bottom, base_bottom))?;
        }

        for col in 1..cols {
            // North wall
            let left = self.top(rows - 1, col - 1);
            let right = self.top(rows - 1, col);
            let base_left = self.base(rows - 1, col - 1);
            let base_right = self.base(rows - 1, col);
            f(self.triangle(left, base_right, base_left))?;
            f(self.triangle(left, right, base_right))?;

            // South wall
            let left = self.top(0, col - 1);
            let right = self.top(0, col);
            let base_left = self.base(0, col - 1);
            let base_right = self.base(0, col);
            f(self.triangle(left, base_left, base_right))?;
            f(self.triangle(left, base_right, right))?;
        }

        let north_west = self.base(rows - 1, 0);
        let north_east = self.base(rows - 1, cols - 1);
        let south_west = self.base(0, 0);
        let south_east = self.base(0, cols - 1);
        f(self.triangle(north_west, south_east, south_west))?;
        f(self.triangle(north_west, north_east, south_east))?;
        Ok(())
    }

    /// All triangles of the solid.
    pub fn triangles(&self) -> Vec<Triangle> {
        let mut out = Vec::new();
        let _ = self.for_each_triangle(|t| {
            out.push(t);
            Ok::<(), std::convert::Infallible>(())
        });
        out
    }

    /// Write the solid as binary STL. Returns the triangle count.
    pub fn write<W: Write>(&self, w: W) -> Result<u32> {
        let count = self.triangle_count()?;
        let mut writer = StlWriter::new(w, DEFAULT_HEADER, count)?;
        self.for_each_triangle(|t| writer.write_triangle(&t))?;
        writer.finish()?;
        Ok(count)
    }

    /// Write the solid to `path`.
    ///
    /// The data goes to a temporary file next to `path` that replaces it
    /// only once complete; on failure no file is left behind.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<u32> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let count = {
            let mut w = BufWriter::new(tmp.as_file_mut());
            let count = self.write(&mut w)?;
            w.flush()?;
            count
        };
        tmp.as_file().sync_all()?;
        debug!("Wrote {} triangles to {}", count, tmp.path().display());
        tmp.persist(path).map_err(|e| MeshError::Io(e.error))?;

        info!("Saved {} triangles to {}", count, path.display());
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridAccumulator;
    use approx::assert_relative_eq;
    use demstl_dem::BoundingBox;

    fn grid_with(rows: usize, cols: usize, resolution: f64, values: &[f32]) -> ElevationGrid {
        let bounds = BoundingBox::new(1.0, 0.0, 1.0, 0.0).unwrap();
        let mut acc = GridAccumulator::new(bounds, rows, cols, resolution);
        for (i, &v) in values.iter().enumerate() {
            acc.accumulate(i / cols, i % cols, v);
        }
        acc.into_grid()
    }

    #[test]
    fn test_triangle_count_formula() {
        assert_eq!(triangle_count(3, 3), Some(26));
        assert_eq!(triangle_count(2, 2), Some(2 + 4 + 4 + 2));
        assert_eq!(triangle_count(1, 1), Some(2));
        assert_eq!(triangle_count(100_000, 100_000), None);
        assert_eq!(triangle_count(usize::MAX, usize::MAX), None);
    }

    #[test]
    fn test_emitted_count_matches() {
        let grid = grid_with(3, 4, 1.0, &[0.0; 12]);
        let builder = MeshBuilder::new(&grid, HeightScale::new(0.0, 1.0, 1.0, 2.0), NormalMode::Raw);
        assert_eq!(builder.triangles().len() as u32, builder.triangle_count().unwrap());
        assert_eq!(builder.triangle_count().unwrap(), 2 * 2 * 3 + 4 * 2 + 4 * 3 + 2);
    }

    #[test]
    fn test_height_mapping() {
        let scale = HeightScale::new(0.0, 20.0, 1.0, 5.0);
        assert_relative_eq!(scale.slope(), 0.2);
        assert_eq!(scale.height(Some(0.0)), 1.0);
        assert_eq!(scale.height(Some(10.0)), 3.0);
        assert_eq!(scale.height(Some(20.0)), 5.0);
        assert_eq!(scale.height(None), 1.0);

        let flat = HeightScale::new(7.0, 7.0, 2.0, 9.0);
        assert_eq!(flat.slope(), 0.0);
        assert_eq!(flat.height(Some(7.0)), 2.0);
    }

    #[test]
    fn test_scale_from_settings() {
        let settings = ExtractSettings {
            min_altitude: -10.0,
            max_altitude: 90.0,
            ..ExtractSettings::default()
        };
        let auto = HeightScale::from_settings(&settings, Some((5.0, 15.0)));
        assert_eq!(auto.min_elevation(), 5.0);
        assert_eq!(auto.max_elevation(), 15.0);

        let no_data = HeightScale::from_settings(&settings, None);
        assert_eq!(no_data.min_elevation(), -10.0);
        assert_eq!(no_data.max_elevation(), 90.0);

        let fixed = ExtractSettings {
            auto_scale_thickness: false,
            ..settings
        };
        let manual = HeightScale::from_settings(&fixed, Some((5.0, 15.0)));
        assert_eq!(manual.min_elevation(), -10.0);
        assert_eq!(manual.max_elevation(), 90.0);
    }

    #[test]
    fn test_surface_quad_heights() {
        // 2x2 grid, elevations 0, 10 (south row) and 10, 20 (north row)
        let grid = grid_with(2, 2, 1.0, &[0.0, 10.0, 10.0, 20.0]);
        let builder = MeshBuilder::new(&grid, HeightScale::new(0.0, 20.0, 1.0, 5.0), NormalMode::Raw);
        let triangles = builder.triangles();
        // West wall pair first, then the surface pair
        let surface = &triangles[2..4];
        assert_eq!(surface[0].vertices[0], Vertex::new(0.0, 1.0, 3.0));
        assert_eq!(surface[0].vertices[1], Vertex::new(1.0, 0.0, 3.0));
        assert_eq!(surface[0].vertices[2], Vertex::new(1.0, 1.0, 5.0));
        assert_eq!(surface[1].vertices[1], Vertex::new(0.0, 0.0, 1.0));
        for t in surface {
            assert!(t.normal.z > 0.0);
        }
    }

    #[test]
    fn test_write_file_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("terrain.stl");
        let grid = grid_with(2, 3, 2.0, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let builder = MeshBuilder::new(&grid, HeightScale::new(1.0, 6.0, 1.0, 2.0), NormalMode::Unit);

        let count = builder.write_file(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 84 + 50 * count as usize);
        assert_eq!(&bytes[..DEFAULT_HEADER.len()], DEFAULT_HEADER.as_bytes());

        // Only the finished file is left in the directory
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
