//! Satellite state time series.

use serde::{Deserialize, Serialize};

use super::horizon::TimeHorizon;
use super::ids::{EphemerisId, SatelliteId};

/// One Earth-fixed state vector: position in kilometers, velocity in
/// kilometers per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StateSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
}

impl StateSample {
    pub fn new(position: [f64; 3], velocity: [f64; 3]) -> Self {
        Self {
            x: position[0],
            y: position[1],
            z: position[2],
            vx: velocity[0],
            vy: velocity[1],
            vz: velocity[2],
        }
    }

    pub fn from_row(row: [f64; 6]) -> Self {
        Self::new([row[0], row[1], row[2]], [row[3], row[4], row[5]])
    }

    /// Field order of the persisted row layout.
    pub fn to_row(&self) -> [f64; 6] {
        [self.x, self.y, self.z, self.vx, self.vy, self.vz]
    }

    pub fn position(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn velocity(&self) -> [f64; 3] {
        [self.vx, self.vy, self.vz]
    }
}

/// Sampled trajectory of one satellite over a horizon.
///
/// `samples[i]` is the state at `horizon.epoch(i)`. `id` is set once the
/// record has been persisted; a shrunk extraction keeps the id of the
/// broader record it was carved from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ephemeris {
    pub id: Option<EphemerisId>,
    pub satellite_id: SatelliteId,
    pub horizon: TimeHorizon,
    pub samples: Vec<StateSample>,
}

impl Ephemeris {
    pub fn new(satellite_id: SatelliteId, horizon: TimeHorizon, samples: Vec<StateSample>) -> Self {
        Self {
            id: None,
            satellite_id,
            horizon,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
