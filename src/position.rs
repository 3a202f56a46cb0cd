//! Geodetic position value type.
//!
//! A [`Position`] is one fix as seen by consumers of the engine: coordinates,
//! a UTC timestamp, and optional metadata. Optional fields use `Option`
//! rather than sentinel values so that "0 degrees" is never conflated with
//! "unknown".
//!
//! Positions are value types: they are cloned, never mutated in place once
//! shared. Deriving a position from a previous one goes through
//! [`Position::from_previous`], which preserves every field not explicitly
//! overwritten afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::Fix;

/// One geodetic fix with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// When this fix was measured (UTC).
    pub timestamp: DateTime<Utc>,

    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Altitude in meters relative to sea level, if reported.
    pub altitude: Option<f64>,

    /// Horizontal error radius in meters, if reported.
    pub accuracy: Option<f64>,

    /// Altitude error range in meters. Some platforms never populate this.
    pub altitude_accuracy: Option<f64>,

    /// Heading in degrees relative to true north, if reported.
    pub heading: Option<f64>,

    /// Speed over ground in meters per second, if reported.
    pub speed: Option<f64>,
}

impl Position {
    /// Create a position with the required fields only.
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            altitude_accuracy: None,
            heading: None,
            speed: None,
        }
    }

    /// Copy-then-patch constructor: start from an existing position and
    /// overwrite fields on the returned value.
    ///
    /// Every field not overwritten keeps the previous position's value.
    pub fn from_previous(previous: &Position) -> Self {
        previous.clone()
    }
}

impl From<&Fix> for Position {
    fn from(fix: &Fix) -> Self {
        Self {
            timestamp: fix.timestamp,
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: fix.altitude,
            accuracy: fix.accuracy,
            altitude_accuracy: fix.altitude_accuracy,
            heading: fix.heading,
            speed: fix.speed,
        }
    }
}

impl From<Fix> for Position {
    fn from(fix: Fix) -> Self {
        Position::from(&fix)
    }
}
