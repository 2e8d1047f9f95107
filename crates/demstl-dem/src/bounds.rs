//! Geographic bounding boxes.

use crate::{DemError, Result};
use serde::{Deserialize, Serialize};

/// Geographic bounds in decimal degrees.
///
/// Boxes never cross the antimeridian, so `north >= south` and
/// `east >= west` always hold for a valid box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Maximum latitude (north edge).
    pub north: f64,
    /// Minimum latitude (south edge).
    pub south: f64,
    /// Maximum longitude (east edge).
    pub east: f64,
    /// Minimum longitude (west edge).
    pub west: f64,
}

impl BoundingBox {
    /// Create a validated bounding box.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self> {
        let bounds = Self {
            north,
            south,
            east,
            west,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Check the ordering and finiteness invariants.
    ///
    /// Boxes read from job files are deserialized field by field, so callers
    /// validate them before use.
    pub fn validate(&self) -> Result<()> {
        let finite = self.north.is_finite()
            && self.south.is_finite()
            && self.east.is_finite()
            && self.west.is_finite();
        if !finite || self.north < self.south || self.east < self.west {
            return Err(DemError::InvalidBounds {
                north: self.north,
                south: self.south,
                east: self.east,
                west: self.west,
            });
        }
        Ok(())
    }

    /// Latitude extent in degrees.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Longitude extent in degrees.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Center point as `(latitude, longitude)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }

    /// Check if a coordinate is within the bounds (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }

    /// Rectangle overlap test.
    ///
    /// Boxes only fail to intersect when they are strictly separated, so two
    /// boxes sharing an edge intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.north < other.south
            || self.south > other.north
            || self.east < other.west
            || self.west > other.east)
    }

    /// Grow the box by `lat_margin` degrees north and south and `lon_margin`
    /// degrees east and west.
    pub fn expanded(&self, lat_margin: f64, lon_margin: f64) -> Self {
        Self {
            north: self.north + lat_margin,
            south: self.south - lat_margin,
            east: self.east + lon_margin,
            west: self.west - lon_margin,
        }
    }
}
