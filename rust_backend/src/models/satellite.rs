//! Satellites and their orbital elements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::SatelliteId;

/// Classical Keplerian elements at `epoch`. Distances in kilometers, angles
/// in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SatelliteOrbit {
    pub epoch: DateTime<Utc>,
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub argument_of_perigee: f64,
    pub raan: f64,
    pub true_anomaly: f64,
}

/// A satellite as referenced by cached ephemerides.
///
/// `id` is `None` for a satellite that has been built in memory and not yet
/// registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Satellite {
    pub id: Option<SatelliteId>,
    pub name: String,
    pub orbit: SatelliteOrbit,
}

impl Satellite {
    pub fn new(name: impl Into<String>, orbit: SatelliteOrbit) -> Self {
        Self {
            id: None,
            name: name.into(),
            orbit,
        }
    }
}
