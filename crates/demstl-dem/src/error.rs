//! Error types for the DEM crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when working with DEM data.
#[derive(Debug, Error)]
pub enum DemError {
    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding error.
    #[error("TIFF decode error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// SQLite error while writing the sample cache.
    #[error("Sample cache error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Raster file could not be interpreted as an elevation raster.
    #[error("Invalid raster {path}: {reason}")]
    InvalidRaster {
        /// Path of the raster file.
        path: PathBuf,
        /// Why the raster was rejected.
        reason: String,
    },

    /// A band index past the dataset's band count was requested.
    #[error("Band {band} requested but dataset only has {count} band(s)")]
    BandOutOfRange {
        /// Requested band (zero based).
        band: usize,
        /// Number of bands in the dataset.
        count: usize,
    },

    /// A raster row past the dataset height was requested.
    #[error("Row {row} requested but dataset only has {height} row(s)")]
    RowOutOfRange {
        /// Requested row.
        row: u32,
        /// Dataset height in rows.
        height: u32,
    },

    /// A row buffer whose length differs from the raster width.
    #[error("Row buffer holds {actual} samples but the raster is {expected} wide")]
    RowBufferLength {
        /// Raster width.
        expected: usize,
        /// Length of the buffer passed in.
        actual: usize,
    },

    /// Bounding box violates north >= south / east >= west, or is not finite.
    #[error("Invalid bounding box: north={north} south={south} east={east} west={west}")]
    InvalidBounds {
        /// North edge.
        north: f64,
        /// South edge.
        south: f64,
        /// East edge.
        east: f64,
        /// West edge.
        west: f64,
    },

    /// Tile lattice parameters do not evenly cover the globe.
    #[error("Invalid tile lattice: span {span_degrees} degrees with {pixels_per_side} pixels per side")]
    InvalidLattice {
        /// Tile span in degrees.
        span_degrees: u32,
        /// Pixels along each tile side.
        pixels_per_side: u32,
    },
}
