//! Land/water classification from boundary polygons.

use crate::kml::{self, KmlNode};
use crate::Result;
use std::path::Path;
use tracing::info;

/// Decides whether a point is on land.
///
/// Gap filling only extends elevations across land; everything else renders
/// at the base thickness.
pub trait LandClassifier {
    /// Whether `(lon, lat)` is on land.
    fn is_land(&self, lon: f64, lat: f64) -> bool;
}

/// A closed ring of `(lon, lat)` vertices with a cached bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct LandPolygon {
    ring: Vec<(f64, f64)>,
    north: f64,
    south: f64,
    east: f64,
    west: f64,
}

impl LandPolygon {
    /// Polygon from its outer ring. The closing vertex may be repeated.
    pub fn new(ring: Vec<(f64, f64)>) -> Self {
        let mut north = f64::MIN;
        let mut south = f64::MAX;
        let mut east = f64::MIN;
        let mut west = f64::MAX;
        for &(lon, lat) in &ring {
            north = north.max(lat);
            south = south.min(lat);
            east = east.max(lon);
            west = west.min(lon);
        }
        Self {
            ring,
            north,
            south,
            east,
            west,
        }
    }

    /// Outer ring vertices.
    pub fn ring(&self) -> &[(f64, f64)] {
        &self.ring
    }

    /// Crossing-number test.
    ///
    /// Edge comparisons are half-open in latitude so a ray through a shared
    /// vertex is counted once.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if self.ring.len() < 3
            || lat > self.north
            || lat < self.south
            || lon > self.east
            || lon < self.west
        {
            return false;
        }

        let mut inside = false;
        let mut j = self.ring.len() - 1;
        for i in 0..self.ring.len() {
            let (lon_i, lat_i) = self.ring[i];
            let (lon_j, lat_j) = self.ring[j];
            if ((lat_i <= lat && lat < lat_j) || (lat_j <= lat && lat < lat_i))
                && lon < (lon_j - lon_i) * (lat - lat_i) / (lat_j - lat_i) + lon_i
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// A set of land polygons. A point is land when any polygon contains it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandMask {
    polygons: Vec<LandPolygon>,
}

impl LandMask {
    /// Mask from polygons.
    pub fn new(polygons: Vec<LandPolygon>) -> Self {
        Self { polygons }
    }

    /// Mask with no land at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the outer boundaries of every polygon in a KML file.
    pub fn from_kml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let root = kml::parse_file(path)?;
        let mask = Self::from_kml(&root);
        info!(
            "Loaded {} land polygons from {}",
            mask.len(),
            path.display()
        );
        Ok(mask)
    }

    /// Load from KML text.
    pub fn from_kml_str(text: &str) -> Result<Self> {
        Ok(Self::from_kml(&kml::parse_str(text)?))
    }

    /// Collect the polygons of a parsed document.
    pub fn from_kml(root: &KmlNode) -> Self {
        Self::new(root.polygons())
    }

    /// Number of polygons.
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    /// Whether the mask has no polygons.
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// The polygons.
    pub fn polygons(&self) -> &[LandPolygon] {
        &self.polygons
    }

    /// Whether any polygon contains `(lon, lat)`.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.polygons.iter().any(|p| p.contains(lon, lat))
    }
}

impl LandClassifier for LandMask {
    fn is_land(&self, lon: f64, lat: f64) -> bool {
        self.contains(lon, lat)
    }
}
