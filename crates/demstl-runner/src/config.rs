//! YAML job files.

use crate::{Result, RunnerError};
use demstl_dem::BoundingBox;
use demstl_mesh::ExtractSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything a run needs besides the output path.
///
/// Relative paths in a job file are taken relative to the file itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Directory holding the `*_dem.tif` tiles.
    pub dem_directory: PathBuf,
    /// KML file of land polygons.
    pub land_boundaries: Option<PathBuf>,
    /// SQLite file written by `load-db`.
    pub working_database: PathBuf,
    /// Grid, size and thickness settings.
    pub extract: ExtractSettings,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            dem_directory: PathBuf::from("dem"),
            land_boundaries: None,
            working_database: PathBuf::from("samples.sqlite"),
            extract: ExtractSettings::default(),
        }
    }
}

impl JobConfig {
    /// Load a job file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Parse job YAML without touching paths.
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the job file, refusing to replace an existing one.
    pub fn save_new<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            return Err(RunnerError::AlreadyExists(path.to_path_buf()));
        }
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Make relative paths relative to `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.dem_directory);
        resolve(&mut self.working_database);
        if let Some(land) = self.land_boundaries.as_mut() {
            resolve(land);
        }
    }
}

/// Bounds given on the command line.
///
/// Each edge replaces the matching edge of the job's bounds. When the job has
/// no bounds all four edges are required.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundsOverride {
    pub north: Option<f64>,
    pub south: Option<f64>,
    pub east: Option<f64>,
    pub west: Option<f64>,
}

impl BoundsOverride {
    /// Whether no edge was given.
    pub fn is_empty(&self) -> bool {
        self.north.is_none() && self.south.is_none() && self.east.is_none() && self.west.is_none()
    }

    /// Apply to `base`.
    pub fn apply(&self, base: Option<BoundingBox>) -> Result<Option<BoundingBox>> {
        if self.is_empty() {
            return Ok(base);
        }
        let bounds = match base {
            Some(b) => BoundingBox::new(
                self.north.unwrap_or(b.north),
                self.south.unwrap_or(b.south),
                self.east.unwrap_or(b.east),
                self.west.unwrap_or(b.west),
            )?,
            None => match (self.north, self.south, self.east, self.west) {
                (Some(n), Some(s), Some(e), Some(w)) => BoundingBox::new(n, s, e, w)?,
                _ => {
                    return Err(RunnerError::Config(
                        "--north, --south, --east and --west are all needed when the job has no bounds"
                            .to_string(),
                    ))
                }
            },
        };
        Ok(Some(bounds))
    }
}
