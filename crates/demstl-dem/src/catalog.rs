//! Global DEM tile lattice and the catalog of tiles present on disk.
//!
//! The world is divided into square tiles of a fixed span. Each tile is
//! named after its southwest corner, e.g. `n30w120_dem.tif` covers
//! 30°N–35°N, 120°W–115°W for the default 5° lattice. The name encodes the
//! *center* of the southwest sample, so tile edges sit half a pixel
//! south and west of the named corner.
//!
//! Tiles are not materialized up front. The catalog indexes the files that
//! exist in the DEM directory once and builds [`Tile`] values on demand.

use crate::{BoundingBox, DemError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tile span of the default MERIT DEM lattice in degrees.
pub const MERIT_TILE_SPAN_DEGREES: u32 = 5;

/// Pixels along each side of a default MERIT DEM tile.
pub const MERIT_TILE_PIXELS: u32 = 6000;

/// Suffix shared by every tile file name.
const TILE_FILE_SUFFIX: &str = "_dem.tif";

/// Shape of the global tile lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLattice {
    /// Width and height of a tile in degrees.
    pub span_degrees: u32,
    /// Number of pixels along each side of a tile.
    pub pixels_per_side: u32,
}

impl Default for TileLattice {
    fn default() -> Self {
        Self::merit()
    }
}

impl TileLattice {
    /// The 5° / 6000 pixel lattice used by MERIT DEM.
    pub const fn merit() -> Self {
        Self {
            span_degrees: MERIT_TILE_SPAN_DEGREES,
            pixels_per_side: MERIT_TILE_PIXELS,
        }
    }

    /// Create a lattice, checking that the span tiles the globe evenly.
    pub fn new(span_degrees: u32, pixels_per_side: u32) -> Result<Self> {
        if span_degrees == 0
            || pixels_per_side == 0
            || 180 % span_degrees != 0
            || 360 % span_degrees != 0
        {
            return Err(DemError::InvalidLattice {
                span_degrees,
                pixels_per_side,
            });
        }
        Ok(Self {
            span_degrees,
            pixels_per_side,
        })
    }

    /// Number of tile rows from the south pole to the north pole.
    pub fn rows(&self) -> u32 {
        180 / self.span_degrees
    }

    /// Number of tile columns from the antimeridian eastward.
    pub fn columns(&self) -> u32 {
        360 / self.span_degrees
    }

    /// Size of one pixel in degrees.
    pub fn pixel_size(&self) -> f64 {
        self.span_degrees as f64 / self.pixels_per_side as f64
    }

    /// Lattice row whose tile covers the given latitude, if any.
    fn row_for_lat(&self, lat: f64) -> Option<u32> {
        let row = ((lat + self.pixel_size() / 2.0 + 90.0) / self.span_degrees as f64).floor();
        (row >= 0.0 && row < self.rows() as f64).then_some(row as u32)
    }

    /// Lattice column whose tile covers the given longitude, if any.
    fn column_for_lon(&self, lon: f64) -> Option<u32> {
        let col = ((lon + self.pixel_size() / 2.0 + 180.0) / self.span_degrees as f64).floor();
        (col >= 0.0 && col < self.columns() as f64).then_some(col as u32)
    }

    /// Lattice key for a tile whose southwest corner is at the given whole
    /// degrees.
    fn key_for_corner(&self, bottom: i32, left: i32) -> Option<TileKey> {
        let span = self.span_degrees as i32;
        let lat = bottom + 90;
        let lon = left + 180;
        if lat < 0 || lon < 0 || lat % span != 0 || lon % span != 0 {
            return None;
        }
        let key = TileKey {
            row: (lat / span) as u32,
            col: (lon / span) as u32,
        };
        (key.row < self.rows() && key.col < self.columns()).then_some(key)
    }
}

/// Position of a tile in the lattice.
///
/// Row 0 starts at 90°S and rows increase northward; column 0 starts at
/// 180°W and columns increase eastward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileKey {
    /// Lattice row.
    pub row: u32,
    /// Lattice column.
    pub col: u32,
}

impl TileKey {
    /// Latitude of the named (southwest) corner.
    fn bottom(&self, lattice: &TileLattice) -> i32 {
        -90 + (self.row * lattice.span_degrees) as i32
    }

    /// Longitude of the named (southwest) corner.
    fn left(&self, lattice: &TileLattice) -> i32 {
        -180 + (self.col * lattice.span_degrees) as i32
    }

    /// File name for the tile, e.g. `n30w120_dem.tif`.
    pub fn file_name(&self, lattice: &TileLattice) -> String {
        let bottom = self.bottom(lattice);
        let left = self.left(lattice);
        format!(
            "{}{:02}{}{:03}{}",
            if bottom < 0 { 's' } else { 'n' },
            bottom.abs(),
            if left < 0 { 'w' } else { 'e' },
            left.abs(),
            TILE_FILE_SUFFIX
        )
    }
}

/// Parse the southwest corner from a tile file name like `s05e120_dem.tif`.
fn corner_from_filename(filename: &str) -> Option<(i32, i32)> {
    let stem = filename.strip_suffix(TILE_FILE_SUFFIX)?;
    let mut chars = stem.chars().peekable();

    let lat_sign = match chars.next()? {
        'n' => 1,
        's' => -1,
        _ => return None,
    };
    let mut lat_str = String::new();
    while let Some(d) = chars.next_if(|c| c.is_ascii_digit()) {
        lat_str.push(d);
    }

    let lon_sign = match chars.next()? {
        'e' => 1,
        'w' => -1,
        _ => return None,
    };
    let lon_str: String = chars.by_ref().take_while(|c| c.is_ascii_digit()).collect();

    if lat_str.is_empty() || lon_str.is_empty() || lon_str.len() != stem.len() - lat_str.len() - 2 {
        return None;
    }

    let lat: i32 = lat_str.parse().ok()?;
    let lon: i32 = lon_str.parse().ok()?;
    Some((lat_sign * lat, lon_sign * lon))
}

/// One tile of the lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    key: TileKey,
    name: String,
    path: PathBuf,
    bounds: BoundingBox,
    pixel_size: f64,
    pixels_per_side: u32,
    exists: bool,
}

impl Tile {
    fn new(lattice: &TileLattice, key: TileKey, directory: &Path, exists: bool) -> Self {
        let name = key.file_name(lattice);
        let pixel_size = lattice.pixel_size();
        // The named corner is the center of the southwest sample
        let south = key.bottom(lattice) as f64 - pixel_size / 2.0;
        let west = key.left(lattice) as f64 - pixel_size / 2.0;
        let span = lattice.span_degrees as f64;
        Self {
            key,
            path: directory.join(&name),
            name,
            bounds: BoundingBox {
                north: south + span,
                south,
                east: west + span,
                west,
            },
            pixel_size,
            pixels_per_side: lattice.pixels_per_side,
            exists,
        }
    }

    /// Lattice position.
    pub fn key(&self) -> TileKey {
        self.key
    }

    /// File name of the tile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path of the tile file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Geographic bounds covered by the tile's samples.
    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Size of one sample in degrees.
    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    /// Nominal samples along each side.
    pub fn pixels_per_side(&self) -> u32 {
        self.pixels_per_side
    }

    /// Whether the tile file was present when the catalog was opened.
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// `(north, south)` latitude strip of raster row `y`.
    pub fn row_strip(&self, y: u32) -> (f64, f64) {
        let north = self.bounds.north - y as f64 * self.pixel_size;
        (north, north - self.pixel_size)
    }

    /// `(west, east)` longitude strip of raster column `x`.
    pub fn column_strip(&self, x: u32) -> (f64, f64) {
        let west = self.bounds.west + x as f64 * self.pixel_size;
        (west, west + self.pixel_size)
    }
}

/// Index of the DEM tiles available in a directory.
///
/// # Example
///
/// ```no_run
/// use demstl_dem::{BoundingBox, TileCatalog};
///
/// let catalog = TileCatalog::open("dem")?;
/// let area = BoundingBox::new(35.0, 34.0, -83.0, -85.0)?;
/// for tile in catalog.tiles_intersecting(&area) {
///     println!("{} {:?}", tile.name(), tile.bounds());
/// }
/// # Ok::<(), demstl_dem::DemError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TileCatalog {
    lattice: TileLattice,
    directory: PathBuf,
    /// Lattice positions whose file exists on disk.
    present: BTreeSet<TileKey>,
}

impl TileCatalog {
    /// Index a directory of MERIT DEM tiles.
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        Self::open_with_lattice(directory, TileLattice::merit())
    }

    /// Index a directory of tiles laid out on a custom lattice.
    ///
    /// Only file names are inspected; tile data is not read. Files that do
    /// not follow the lattice naming are ignored.
    pub fn open_with_lattice<P: AsRef<Path>>(directory: P, lattice: TileLattice) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        let mut present = BTreeSet::new();

        for entry in std::fs::read_dir(&directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(filename) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let key = corner_from_filename(&filename)
                .and_then(|(bottom, left)| lattice.key_for_corner(bottom, left));
            match key {
                Some(key) if key.file_name(&lattice) == filename => {
                    present.insert(key);
                }
                _ => debug!("Ignoring non-tile file {}", filename),
            }
        }

        debug!(
            "Indexed {} tile(s) in {}",
            present.len(),
            directory.display()
        );

        Ok(Self {
            lattice,
            directory,
            present,
        })
    }

    /// The lattice this catalog indexes.
    pub fn lattice(&self) -> TileLattice {
        self.lattice
    }

    /// Directory holding the tile files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of tiles present on disk.
    pub fn tile_count(&self) -> usize {
        self.present.len()
    }

    /// Whether the tile at `key` exists on disk.
    pub fn exists(&self, key: TileKey) -> bool {
        self.present.contains(&key)
    }

    /// Build the tile at `key`, or `None` if the key is outside the lattice.
    pub fn tile(&self, key: TileKey) -> Option<Tile> {
        if key.row >= self.lattice.rows() || key.col >= self.lattice.columns() {
            return None;
        }
        Some(Tile::new(
            &self.lattice,
            key,
            &self.directory,
            self.exists(key),
        ))
    }

    /// Tile that covers a coordinate, whether or not it exists on disk.
    pub fn tile_for_coord(&self, lat: f64, lon: f64) -> Option<Tile> {
        let row = self.lattice.row_for_lat(lat)?;
        let col = self.lattice.column_for_lon(lon)?;
        self.tile(TileKey { row, col })
    }

    /// Every tile of the lattice, south to north then west to east.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        let columns = self.lattice.columns();
        (0..self.lattice.rows()).flat_map(move |row| {
            (0..columns).map(move |col| {
                let key = TileKey { row, col };
                Tile::new(&self.lattice, key, &self.directory, self.exists(key))
            })
        })
    }

    /// Tiles present on disk, south to north then west to east.
    pub fn existing_tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        self.present
            .iter()
            .map(move |&key| Tile::new(&self.lattice, key, &self.directory, true))
    }

    /// Existing tiles whose bounds intersect `area`.
    ///
    /// Only the lattice positions around `area` are visited.
    pub fn tiles_intersecting(&self, area: &BoundingBox) -> Vec<Tile> {
        let span = self.lattice.span_degrees as f64;
        let half = self.lattice.pixel_size() / 2.0;
        let max_row = self.lattice.rows() as i64 - 1;
        let max_col = self.lattice.columns() as i64 - 1;

        // One extra position on each side catches tiles that only touch `area`
        let first_row = (((area.south + half + 90.0) / span).floor() as i64 - 1).clamp(0, max_row);
        let last_row = (((area.north + half + 90.0) / span).floor() as i64 + 1).clamp(0, max_row);
        let first_col = (((area.west + half + 180.0) / span).floor() as i64 - 1).clamp(0, max_col);
        let last_col = (((area.east + half + 180.0) / span).floor() as i64 + 1).clamp(0, max_col);

        let mut tiles = Vec::new();
        for row in first_row..=last_row {
            for col in first_col..=last_col {
                let key = TileKey {
                    row: row as u32,
                    col: col as u32,
                };
                if !self.exists(key) {
                    continue;
                }
                let tile = Tile::new(&self.lattice, key, &self.directory, true);
                if tile.bounds().intersects(area) {
                    tiles.push(tile);
                }
            }
        }
        tiles
    }

    /// Get the bounding box that covers all existing tiles.
    pub fn total_bounds(&self) -> Option<BoundingBox> {
        let mut tiles = self.existing_tiles();
        let mut total = tiles.next()?.bounds();
        for tile in tiles {
            let b = tile.bounds();
            total.north = total.north.max(b.north);
            total.south = total.south.min(b.south);
            total.east = total.east.max(b.east);
            total.west = total.west.min(b.west);
        }
        Some(total)
    }
}
