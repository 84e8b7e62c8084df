//! Inertial to Earth-fixed conversion through the mean sidereal angle.
//!
//! Precession, nutation and polar motion are ignored: the fixed frame is the
//! inertial frame rotated about its z axis by the Greenwich mean sidereal
//! time.

use chrono::{DateTime, Utc};

use super::{ComputeError, FrameConversion};
use crate::models::{StateSample, TimeHorizon};

/// Earth rotation rate, rad/s.
pub const EARTH_ROTATION_RATE: f64 = 7.292_115_855_3e-5;

/// J2000.0 (2000-01-01T12:00:00Z) as Unix seconds.
const J2000_UNIX_SECONDS: f64 = 946_728_000.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

const GMST_AT_J2000_DEG: f64 = 280.460_618_37;
const GMST_RATE_DEG_PER_DAY: f64 = 360.985_647_366_29;

/// Greenwich mean sidereal angle at `instant`, radians in `[0, 2pi)`.
pub fn gmst(instant: DateTime<Utc>) -> f64 {
    let unix = instant.timestamp_millis() as f64 / 1_000.0;
    let days = (unix - J2000_UNIX_SECONDS) / SECONDS_PER_DAY;
    (GMST_AT_J2000_DEG + GMST_RATE_DEG_PER_DAY * days)
        .rem_euclid(360.0)
        .to_radians()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EarthRotation;

impl EarthRotation {
    /// Rotate one inertial state into the fixed frame at `instant`.
    pub fn to_fixed(&self, instant: DateTime<Utc>, state: &StateSample) -> StateSample {
        let (s, c) = gmst(instant).sin_cos();
        let x = c * state.x + s * state.y;
        let y = -s * state.x + c * state.y;
        let vx = c * state.vx + s * state.vy;
        let vy = -s * state.vx + c * state.vy;

        // The frame itself rotates, so subtract omega x r.
        StateSample::new(
            [x, y, state.z],
            [
                vx + EARTH_ROTATION_RATE * y,
                vy - EARTH_ROTATION_RATE * x,
                state.vz,
            ],
        )
    }
}

impl FrameConversion for EarthRotation {
    fn inertial_to_fixed(
        &self,
        horizon: &TimeHorizon,
        samples: &[StateSample],
    ) -> Result<Vec<StateSample>, ComputeError> {
        if samples.len() != horizon.sample_count() {
            return Err(ComputeError::FrameConversion(format!(
                "{} samples for a horizon of {} epochs",
                samples.len(),
                horizon.sample_count()
            )));
        }
        Ok(horizon
            .epochs()
            .zip(samples)
            .map(|(epoch, state)| self.to_fixed(epoch, state))
            .collect())
    }
}
