//! End-to-end generation: extract, fill, scale and write.

use crate::extract::extract_elevations;
use crate::fill::{fill_gaps, FillStats};
use crate::grid::ElevationGrid;
use crate::land::{LandClassifier, LandMask};
use crate::mesh::{HeightScale, MeshBuilder};
use crate::settings::ExtractSettings;
use crate::Result;
use demstl_dem::{RasterSource, TileCatalog, TileFailure};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A grid ready for meshing.
#[derive(Debug, Clone)]
pub struct PreparedGrid {
    /// Filled grid; every cell is resolved or baseline.
    pub grid: ElevationGrid,
    /// Tiles read successfully.
    pub tiles_read: usize,
    /// Tiles that could not be read.
    pub tile_failures: Vec<TileFailure>,
    /// How cells were resolved.
    pub fill: FillStats,
}

/// Summary of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub rows: usize,
    pub cols: usize,
    pub tiles_read: usize,
    pub tile_failures: Vec<TileFailure>,
    /// Polygons in the land mask.
    pub land_polygons: usize,
    /// Why the land boundaries could not be loaded, if they were not.
    pub land_error: Option<String>,
    /// Elevation range found in the DEM data.
    pub observed_min: Option<f32>,
    pub observed_max: Option<f32>,
    /// Elevation range mapped onto the thickness.
    pub scale_min: f64,
    pub scale_max: f64,
    pub averaged_cells: usize,
    pub interpolated_cells: usize,
    pub baseline_cells: usize,
    pub triangles: u32,
    pub output: PathBuf,
}

/// Load the land mask, falling back to an empty mask.
///
/// Without land polygons every cell that has no DEM data renders at the base
/// thickness. Returns the mask and the load error, if any.
pub fn load_land_mask(path: Option<&Path>) -> (LandMask, Option<String>) {
    let Some(path) = path else {
        warn!("No land boundaries configured; cells without data will be flat");
        return (LandMask::empty(), None);
    };
    match LandMask::from_kml_file(path) {
        Ok(mask) => (mask, None),
        Err(e) => {
            warn!(
                "Problem loading land boundaries {}: {}; treating everything as water",
                path.display(),
                e
            );
            (LandMask::empty(), Some(e.to_string()))
        }
    }
}

/// Extract the grid for `settings` and fill its gaps.
pub fn prepare_grid(
    settings: &ExtractSettings,
    catalog: &TileCatalog,
    source: &dyn RasterSource,
    land: &dyn LandClassifier,
) -> Result<PreparedGrid> {
    let extraction = extract_elevations(settings, catalog, source)?;
    let mut grid = extraction.grid;
    let fill = fill_gaps(&mut grid, land);
    Ok(PreparedGrid {
        grid,
        tiles_read: extraction.tiles_read,
        tile_failures: extraction.failures,
        fill,
    })
}

/// Generate the STL for `settings` and write it to `output`.
///
/// Tile and land boundary problems are reported and tolerated; failing to
/// write the output is an error.
pub fn generate(
    settings: &ExtractSettings,
    catalog: &TileCatalog,
    source: &dyn RasterSource,
    land_boundaries: Option<&Path>,
    output: &Path,
) -> Result<GenerationReport> {
    settings.validate()?;
    let (land, land_error) = load_land_mask(land_boundaries);
    let prepared = prepare_grid(settings, catalog, source, &land)?;

    let observed = prepared.grid.observed_range();
    let scale = HeightScale::from_settings(settings, observed);
    info!(
        "Scaling elevations {:.1}..{:.1} to {}..{}",
        scale.min_elevation(),
        scale.max_elevation(),
        settings.base_thickness,
        settings.thickness
    );

    let builder = MeshBuilder::new(&prepared.grid, scale, settings.normals);
    let triangles = builder.write_file(output)?;

    Ok(GenerationReport {
        rows: prepared.grid.rows(),
        cols: prepared.grid.cols(),
        tiles_read: prepared.tiles_read,
        tile_failures: prepared.tile_failures,
        land_polygons: land.len(),
        land_error,
        observed_min: observed.map(|(min, _)| min),
        observed_max: observed.map(|(_, max)| max),
        scale_min: scale.min_elevation(),
        scale_max: scale.max_elevation(),
        averaged_cells: prepared.fill.averaged,
        interpolated_cells: prepared.fill.interpolated,
        baseline_cells: prepared.fill.baseline,
        triangles,
        output: output.to_path_buf(),
    })
}
