//! # demstl-mesh
//!
//! Turns an area of DEM tiles into a printable binary STL solid.
//!
//! ## Pipeline
//!
//! 1. [`extract_elevations`] averages DEM samples into a grid of cells, one
//!    cell per `resolution` of output size.
//! 2. [`fill_gaps`] estimates cells without samples by scanning rows and
//!    columns, using a [`LandMask`] to keep estimates on land.
//! 3. [`MeshBuilder`] scales elevations to thickness with a [`HeightScale`]
//!    and writes the closed solid.
//!
//! [`generate`] runs all three and returns a [`GenerationReport`].
//!
//! ## Example
//!
//! ```no_run
//! use demstl_dem::{BoundingBox, GeoTiffSource, TileCatalog};
//! use demstl_mesh::{generate, ExtractSettings};
//! use std::path::Path;
//!
//! let catalog = TileCatalog::open("dem")?;
//! let settings = ExtractSettings {
//!     bounds: Some(BoundingBox::new(35.0, 34.0, -83.0, -85.0)?),
//!     ..ExtractSettings::default()
//! };
//! let report = generate(
//!     &settings,
//!     &catalog,
//!     &GeoTiffSource,
//!     Some(Path::new("ne_10m_land.kml")),
//!     Path::new("terrain.stl"),
//! )?;
//! println!("{} triangles", report.triangles);
//! # Ok::<(), demstl_mesh::MeshError>(())
//! ```

mod error;
mod extract;
mod fill;
mod grid;
pub mod kml;
mod land;
mod mesh;
mod pipeline;
mod settings;
pub mod stl;

pub use error::{MeshError, Result};
pub use extract::{extract_elevations, Extraction};
pub use fill::{fill_gaps, FillStats};
pub use grid::{ElevationCell, ElevationGrid, GridAccumulator, GridShape};
pub use kml::KmlNode;
pub use land::{LandClassifier, LandMask, LandPolygon};
pub use mesh::{triangle_count, HeightScale, MeshBuilder};
pub use pipeline::{generate, load_land_mask, prepare_grid, GenerationReport, PreparedGrid};
pub use settings::{ExtractSettings, NormalMode};
pub use stl::{StlWriter, Triangle, Vertex};
