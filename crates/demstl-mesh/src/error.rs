//! Error types for mesh generation.

use demstl_dem::DemError;
use thiserror::Error;

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur while building or writing a mesh.
#[derive(Debug, Error)]
pub enum MeshError {
    /// I/O error reading the land boundaries or writing the STL file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the DEM layer.
    #[error("DEM error: {0}")]
    Dem(#[from] DemError),

    /// Land boundary document is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Land boundary document could not be interpreted.
    #[error("KML error: {0}")]
    Kml(String),

    /// Extraction settings are unusable.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// The grid needs more triangles than a binary STL can count.
    #[error("A {rows}x{cols} grid needs more than u32::MAX triangles")]
    TooManyTriangles {
        /// Grid rows.
        rows: usize,
        /// Grid columns.
        cols: usize,
    },
}
