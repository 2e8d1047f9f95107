//! Settings for turning an area of DEM data into an STL solid.

use crate::mesh::triangle_count;
use crate::{MeshError, Result};
use demstl_dem::BoundingBox;
use serde::{Deserialize, Serialize};

/// How facet normals are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalMode {
    /// Cross product of the two edges from the first vertex, not normalized.
    #[default]
    Raw,
    /// Unit length normals.
    Unit,
}

/// Settings for creating an STL from DEM data.
///
/// Lengths are in output units (millimeters for the defaults, which give a
/// 36 x 24 x 1 inch print).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSettings {
    /// Size of a mesh grid cell.
    pub resolution: f64,
    /// Width of the generated solid (west to east).
    pub width: f64,
    /// Height of the generated solid (south to north).
    pub height: f64,
    /// Thickness at the highest elevation.
    pub thickness: f64,
    /// Thickness at the lowest elevation and wherever there is no data.
    pub base_thickness: f64,
    /// Scale thickness using the elevation range found in the DEM data.
    pub auto_scale_thickness: bool,
    /// Elevation mapped to `base_thickness` when not auto scaling.
    pub min_altitude: f64,
    /// Elevation mapped to `thickness` when not auto scaling.
    pub max_altitude: f64,
    /// Facet normal convention.
    pub normals: NormalMode,
    /// Area of DEM data to convert.
    pub bounds: Option<BoundingBox>,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            resolution: 0.25,
            width: 914.4,
            height: 609.6,
            thickness: 25.4,
            base_thickness: 6.35,
            auto_scale_thickness: true,
            // Lowest point in North America
            min_altitude: -85.9536,
            // Highest point in North America
            max_altitude: 6190.0,
            normals: NormalMode::Raw,
            bounds: None,
        }
    }
}

impl ExtractSettings {
    /// Check the settings and return the validated area.
    pub fn validate(&self) -> Result<BoundingBox> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(MeshError::InvalidSettings(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        };
        positive("resolution", self.resolution)?;
        positive("width", self.width)?;
        positive("height", self.height)?;

        let (rows, cols) = self.grid_dimensions();
        if triangle_count(rows, cols).is_none() {
            return Err(MeshError::InvalidSettings(format!(
                "a {} x {} grid has too many triangles for a binary STL; use a coarser resolution",
                rows, cols
            )));
        }

        if !(self.base_thickness.is_finite() && self.base_thickness >= 0.0) {
            return Err(MeshError::InvalidSettings(format!(
                "base_thickness must not be negative, got {}",
                self.base_thickness
            )));
        }
        if !(self.thickness.is_finite() && self.thickness >= self.base_thickness) {
            return Err(MeshError::InvalidSettings(format!(
                "thickness {} is below base_thickness {}",
                self.thickness, self.base_thickness
            )));
        }
        if !(self.min_altitude.is_finite() && self.max_altitude.is_finite()) {
            return Err(MeshError::InvalidSettings(
                "min_altitude and max_altitude must be finite".to_string(),
            ));
        }

        let bounds = self
            .bounds
            .ok_or_else(|| MeshError::InvalidSettings("no bounds set".to_string()))?;
        bounds.validate()?;
        Ok(bounds)
    }

    /// Grid `(rows, cols)`.
    ///
    /// The extra row and column put the outside edge of the mesh at the top
    /// and right.
    pub fn grid_dimensions(&self) -> (usize, usize) {
        let rows = ((self.height / self.resolution).ceil() as usize).saturating_add(1);
        let cols = ((self.width / self.resolution).ceil() as usize).saturating_add(1);
        (rows, cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_bounds() -> ExtractSettings {
        ExtractSettings {
            bounds: Some(BoundingBox::new(35.0, 34.0, -83.0, -85.0).unwrap()),
            ..ExtractSettings::default()
        }
    }

    #[test]
    fn test_grid_dimensions() {
        let settings = ExtractSettings {
            resolution: 1.0,
            width: 2.0,
            height: 2.0,
            ..with_bounds()
        };
        assert_eq!(settings.grid_dimensions(), (3, 3));

        let settings = ExtractSettings {
            resolution: 0.3,
            width: 1.0,
            height: 0.5,
            ..with_bounds()
        };
        // ceil(3.33) + 1, ceil(1.67) + 1
        assert_eq!(settings.grid_dimensions(), (3, 5));
    }

    #[test]
    fn test_validate() {
        assert!(with_bounds().validate().is_ok());
        assert!(ExtractSettings::default().validate().is_err());

        let bad = ExtractSettings {
            resolution: 0.0,
            ..with_bounds()
        };
        assert!(matches!(bad.validate(), Err(MeshError::InvalidSettings(_))));

        let bad = ExtractSettings {
            thickness: 1.0,
            base_thickness: 2.0,
            ..with_bounds()
        };
        assert!(bad.validate().is_err());

        let bad = ExtractSettings {
            bounds: Some(BoundingBox {
                north: 0.0,
                south: 1.0,
                east: 1.0,
                west: 0.0,
            }),
            ..with_bounds()
        };
        assert!(matches!(bad.validate(), Err(MeshError::Dem(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_grid() {
        let fine = ExtractSettings {
            resolution: 0.01,
            ..with_bounds()
        };
        let (rows, cols) = fine.grid_dimensions();
        assert!(rows > 60_000 && cols > 91_000);
        assert!(matches!(fine.validate(), Err(MeshError::InvalidSettings(_))));

        let tiny = ExtractSettings {
            resolution: f64::MIN_POSITIVE,
            ..with_bounds()
        };
        assert_eq!(tiny.grid_dimensions(), (usize::MAX, usize::MAX));
        assert!(matches!(tiny.validate(), Err(MeshError::InvalidSettings(_))));

        let coarse = ExtractSettings {
            resolution: 0.5,
            ..with_bounds()
        };
        assert!(coarse.validate().is_ok());
    }

    #[test]
    fn test_yaml_defaults() {
        let yaml = "resolution: 0.5\nnormals: unit\nbounds: { north: 35.0, south: 34.0, east: -83.0, west: -85.0 }\n";
        let settings: ExtractSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.resolution, 0.5);
        assert_eq!(settings.width, 914.4);
        assert_eq!(settings.normals, NormalMode::Unit);
        assert!(settings.auto_scale_thickness);
        assert_eq!(settings.bounds.unwrap().west, -85.0);
    }
}
