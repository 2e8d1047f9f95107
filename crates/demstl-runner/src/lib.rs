//! # demstl-runner
//!
//! Job files and commands behind the `demstl` binary.
//!
//! A job file names the DEM directory, the land boundary KML, the working
//! database and the [`ExtractSettings`]. The commands are:
//!
//! - [`run_generate`]: write the STL for the job's area
//! - [`run_load_db`]: spool the raw samples under the area into SQLite
//! - [`list_tiles`]: show which tiles are available
//! - [`run_init`]: write a job file with default settings

mod config;

pub use config::{BoundsOverride, JobConfig};

use demstl_dem::{
    BoundingBox, DemError, GeoTiffSource, SampleCache, SpoolReport, Tile, TileCatalog,
};
use demstl_mesh::{generate, ExtractSettings, GenerationReport, MeshError};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DEM error: {0}")]
    Dem(#[from] DemError),

    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),
}

/// Generate the STL for `job` into `output`.
pub fn run_generate(job: &JobConfig, output: &Path) -> Result<GenerationReport> {
    let catalog = TileCatalog::open(&job.dem_directory)?;
    info!(
        "Indexed {} tiles in {}",
        catalog.tile_count(),
        job.dem_directory.display()
    );
    let report = generate(
        &job.extract,
        &catalog,
        &GeoTiffSource,
        job.land_boundaries.as_deref(),
        output,
    )?;
    Ok(report)
}

/// Recreate `database` and spool every sample of the tiles under the job's
/// area into it.
pub fn run_load_db(job: &JobConfig, database: &Path) -> Result<SpoolReport> {
    let bounds = job_bounds(&job.extract)?;
    let catalog = TileCatalog::open(&job.dem_directory)?;
    let mut cache = SampleCache::create(database)?;
    Ok(cache.load_area(&catalog, &GeoTiffSource, &bounds))
}

/// Tiles present in `dem_directory`, optionally only those intersecting
/// `area`.
pub fn list_tiles(dem_directory: &Path, area: Option<&BoundingBox>) -> Result<Vec<Tile>> {
    let catalog = TileCatalog::open(dem_directory)?;
    Ok(match area {
        Some(area) => catalog.tiles_intersecting(area),
        None => catalog.existing_tiles().collect(),
    })
}

/// Write a job file with default settings.
pub fn run_init(path: &Path) -> Result<()> {
    JobConfig::default().save_new(path)?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn job_bounds(settings: &ExtractSettings) -> Result<BoundingBox> {
    let bounds = settings
        .bounds
        .ok_or_else(|| RunnerError::Config("the job has no bounds".to_string()))?;
    bounds.validate()?;
    Ok(bounds)
}

/// Human readable summary of a generation run.
pub fn format_report(report: &GenerationReport) -> String {
    ReportSummary(report).to_string()
}

/// Text layout of a [`GenerationReport`].
struct ReportSummary<'a>(&'a GenerationReport);

impl fmt::Display for ReportSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(f, "Output:        {}", report.output.display())?;
        writeln!(f, "Grid:          {} x {} cells", report.rows, report.cols)?;
        writeln!(
            f,
            "Tiles:         {} read, {} failed",
            report.tiles_read,
            report.tile_failures.len()
        )?;
        for failure in &report.tile_failures {
            writeln!(f, "  {}: {}", failure.path.display(), failure.message)?;
        }
        match &report.land_error {
            Some(e) => writeln!(f, "Land polygons: none ({})", e)?,
            None => writeln!(f, "Land polygons: {}", report.land_polygons)?,
        }
        match (report.observed_min, report.observed_max) {
            (Some(min), Some(max)) => writeln!(f, "Elevations:    {:.1} to {:.1}", min, max)?,
            _ => writeln!(f, "Elevations:    no data")?,
        }
        writeln!(
            f,
            "Scaled range:  {:.1} to {:.1}",
            report.scale_min, report.scale_max
        )?;
        writeln!(
            f,
            "Cells:         {} averaged, {} interpolated, {} baseline",
            report.averaged_cells, report.interpolated_cells, report.baseline_cells
        )?;
        write!(f, "Triangles:     {}", report.triangles)
    }
}

/// Report as pretty JSON.
pub fn report_json(report: &GenerationReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
