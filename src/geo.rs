//! Position types for the departure engine.
//!
//! A raw location sample is carried in two forms: a precise form used for
//! routing requests, and a coarse form (rounded to 3 decimal degrees,
//! roughly a city block) used only as a deduplication and movement key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A full-precision position, used as the origin of routing requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Round to the coarse 3-decimal form used as a dedup/movement key.
    pub fn coarse(&self) -> CoarseCoordinates {
        CoarseCoordinates {
            lon_milli: round_millidegrees(self.longitude),
            lat_milli: round_millidegrees(self.latitude),
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // "lat,lng" is the order routing providers expect
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// A position rounded to 3 decimal degrees.
///
/// Stored as integer millidegrees so equality and hashing are exact; two
/// samples taken from the same block compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoarseCoordinates {
    lon_milli: i32,
    lat_milli: i32,
}

impl CoarseCoordinates {
    pub fn longitude(&self) -> f64 {
        f64::from(self.lon_milli) / 1000.0
    }

    pub fn latitude(&self) -> f64 {
        f64::from(self.lat_milli) / 1000.0
    }
}

impl fmt::Display for CoarseCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3},{:.3}", self.latitude(), self.longitude())
    }
}

/// Half-up rounding to millidegrees (ties round away from zero).
fn round_millidegrees(degrees: f64) -> i32 {
    (degrees * 1000.0).round() as i32
}
