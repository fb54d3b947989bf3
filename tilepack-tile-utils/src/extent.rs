use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{MAX_LATITUDE, MAX_LONGITUDE};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TileUtilsError {
    #[error("Bounding box '{0}' must have exactly four comma-separated values: west,south,east,north")]
    InvalidBboxLength(String),

    #[error("Bounding box '{0}' contains a value that is not a number: {1}")]
    InvalidBboxValue(String, String),
}

/// Clamps a longitude to `[-180, 180]`. NaN is passed through unchanged.
#[must_use]
pub fn clamp_longitude(v: f64) -> f64 {
    v.clamp(-MAX_LONGITUDE, MAX_LONGITUDE)
}

/// Clamps a latitude to the Web Mercator limit `[-85.051129, 85.051129]`.
/// NaN is passed through unchanged.
#[must_use]
pub fn clamp_latitude(v: f64) -> f64 {
    v.clamp(-MAX_LATITUDE, MAX_LATITUDE)
}

/// Geographic extent in EPSG:4326 degrees.
///
/// The null extent ([`GeoExtent::NULL`]) has all four coordinates set to NaN; it is
/// the identity element of [`GeoExtent::combine`] and is always degenerate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoExtent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoExtent {
    pub const NULL: Self = Self {
        west: f64::NAN,
        south: f64::NAN,
        east: f64::NAN,
        north: f64::NAN,
    };

    /// The whole Web Mercator tiled world.
    pub const MAX_TILED: Self = Self {
        west: -MAX_LONGITUDE,
        south: -MAX_LATITUDE,
        east: MAX_LONGITUDE,
        north: MAX_LATITUDE,
    };

    #[must_use]
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.west.is_nan() && self.south.is_nan() && self.east.is_nan() && self.north.is_nan()
    }

    /// Clamps each coordinate independently to the tiled world.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            west: clamp_longitude(self.west),
            south: clamp_latitude(self.south),
            east: clamp_longitude(self.east),
            north: clamp_latitude(self.north),
        }
    }

    /// True unless `west < east` and `south < north`. Any NaN makes the extent degenerate.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !(self.west < self.east && self.south < self.north)
    }

    /// Smallest extent containing both `self` and `other`. Null extents are ignored.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        if self.is_null() {
            return *other;
        }
        if other.is_null() {
            return *self;
        }
        Self {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }
}

impl Default for GeoExtent {
    fn default() -> Self {
        Self::NULL
    }
}

impl Display for GeoExtent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

impl FromStr for GeoExtent {
    type Err = TileUtilsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| {
                let v = v.trim();
                v.parse::<f64>()
                    .map_err(|_| TileUtilsError::InvalidBboxValue(s.to_string(), v.to_string()))
            })
            .collect::<Result<Vec<f64>, _>>()?;
        match values.as_slice() {
            &[west, south, east, north] => Ok(Self::new(west, south, east, north)),
            _ => Err(TileUtilsError::InvalidBboxLength(s.to_string())),
        }
    }
}

impl Serialize for GeoExtent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GeoExtent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
