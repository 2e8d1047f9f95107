//! # demstl-dem
//!
//! DEM tile catalog and raster access for turning MERIT DEM tiles into
//! printable terrain meshes.
//!
//! ## Overview
//!
//! MERIT DEM is distributed as 5° x 5° GeoTIFF tiles of 6000 x 6000 f32
//! samples (3 arc-seconds, ~90 m at the equator). Tiles are named after the
//! center of their southwest sample, e.g. `n30w120_dem.tif`.
//!
//! This crate provides:
//! - [`TileCatalog`]: the global tile lattice, indexed against a directory
//!   of tile files
//! - [`RasterSource`] / [`RasterDataset`]: row-by-row access to tile samples,
//!   with a GeoTIFF implementation ([`GeoTiffSource`])
//! - [`SampleCache`]: an optional SQLite spool of raw samples for debugging
//!
//! ## Example
//!
//! ```no_run
//! use demstl_dem::{BoundingBox, GeoTiffSource, RasterSource, TileCatalog};
//!
//! let catalog = TileCatalog::open("dem")?; // Fast - just indexes file names
//! let area = BoundingBox::new(35.0, 34.0, -83.0, -85.0)?;
//!
//! for tile in catalog.tiles_intersecting(&area) {
//!     let mut dataset = GeoTiffSource.open(tile.path())?;
//!     let mut row = vec![0.0; dataset.width() as usize];
//!     dataset.read_row(0, 0, &mut row)?;
//!     println!("{}: first sample {}", tile.name(), row[0]);
//! }
//! # Ok::<(), demstl_dem::DemError>(())
//! ```

mod bounds;
mod cache;
mod catalog;
mod error;
mod raster;

pub use bounds::BoundingBox;
pub use cache::{CachedSample, SampleCache, SpoolReport};
pub use catalog::{Tile, TileCatalog, TileKey, TileLattice, MERIT_TILE_PIXELS, MERIT_TILE_SPAN_DEGREES};
pub use error::DemError;
pub use raster::{
    GeoTiffDataset, GeoTiffSource, MemoryRaster, MemoryRasterSource, RasterDataset, RasterSource,
};

use serde::Serialize;
use std::path::PathBuf;

/// Result type for DEM operations.
pub type Result<T> = std::result::Result<T, DemError>;

/// A tile that could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileFailure {
    /// Path of the tile file.
    pub path: PathBuf,
    /// Error message.
    pub message: String,
}

impl TileFailure {
    /// Record a failure of `tile`.
    pub fn new(tile: &Tile, error: &dyn std::fmt::Display) -> Self {
        Self {
            path: tile.path().to_path_buf(),
            message: error.to_string(),
        }
    }
}
