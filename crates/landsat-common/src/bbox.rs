//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::error::{LandsatError, LandsatResult};

/// An axis-aligned bounding box.
///
/// In geographic coordinates (EPSG:4326) `min_x`/`max_x` are longitudes and
/// `min_y`/`max_y` latitudes. In a projected CRS (UTM) they are meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create from a `[min_x, min_y, max_x, max_y]` array.
    pub fn from_array(bounds: [f64; 4]) -> Self {
        Self::new(bounds[0], bounds[1], bounds[2], bounds[3])
    }

    /// Parse a "minx,miny,maxx,maxy" string.
    pub fn parse(s: &str) -> LandsatResult<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(LandsatError::InvalidBbox(format!(
                "{}: expected 'minx,miny,maxx,maxy'",
                s
            )));
        }

        let mut values = [0.0; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| LandsatError::InvalidBbox(format!("invalid number '{}'", part)))?;
        }

        Ok(Self::from_array(values))
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Center point as (x, y).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// As a `[min_x, min_y, max_x, max_y]` array.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Compute the intersection of two bounding boxes.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }

        Some(BoundingBox {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Check if `other` lies entirely within this bbox.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// A geographic box whose west edge is east of its east edge wraps the antimeridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.min_x > self.max_x
    }

    /// Reject boxes that wrap the antimeridian or have inverted latitudes.
    pub fn validate_geographic(&self) -> LandsatResult<()> {
        if self.crosses_antimeridian() {
            return Err(LandsatError::CrossesAntimeridian {
                xmin: self.min_x,
                xmax: self.max_x,
            });
        }
        if self.min_y > self.max_y {
            return Err(LandsatError::InvalidBbox(format!(
                "min_y {} is greater than max_y {}",
                self.min_y, self.max_y
            )));
        }
        Ok(())
    }

    /// Generate a cache key fragment for this bbox (quantized to avoid floating point issues).
    pub fn cache_key(&self) -> String {
        format!(
            "{:.9}_{:.9}_{:.9}_{:.9}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}
