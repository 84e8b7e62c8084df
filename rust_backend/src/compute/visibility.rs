//! Elevation-mask visibility over an Earth-fixed ephemeris.

use chrono::{DateTime, Duration, Utc};

use super::{ComputeError, EligibilityComputation, InterpolationMethod, InterpolationSettings};
use crate::models::{
    ElevationMask, Ephemeris, GroundLocation, StateSample, TimeHorizon, VisibilityWindow,
};

/// WGS84 equatorial radius, km.
const WGS84_A: f64 = 6_378.137;
/// WGS84 flattening.
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Earth-fixed position of a geodetic location on the WGS84 ellipsoid, km.
pub fn geodetic_to_fixed(location: &GroundLocation) -> [f64; 3] {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let (sin_lat, cos_lat) = location.latitude.to_radians().sin_cos();
    let (sin_lon, cos_lon) = location.longitude.to_radians().sin_cos();
    let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    [
        (n + location.altitude) * cos_lat * cos_lon,
        (n + location.altitude) * cos_lat * sin_lon,
        (n * (1.0 - e2) + location.altitude) * sin_lat,
    ]
}

/// Observer-centered topocentric view of a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAngles {
    /// Degrees clockwise from north, in `[0, 360)`.
    pub azimuth: f64,
    /// Degrees above the local horizon.
    pub elevation: f64,
}

/// Azimuth and elevation of `target` (Earth-fixed, km) seen from `location`.
pub fn look_angles(location: &GroundLocation, target: [f64; 3]) -> LookAngles {
    let site = geodetic_to_fixed(location);
    let d = [target[0] - site[0], target[1] - site[1], target[2] - site[2]];
    let (sin_lat, cos_lat) = location.latitude.to_radians().sin_cos();
    let (sin_lon, cos_lon) = location.longitude.to_radians().sin_cos();

    let east = -sin_lon * d[0] + cos_lon * d[1];
    let north = -sin_lat * cos_lon * d[0] - sin_lat * sin_lon * d[1] + cos_lat * d[2];
    let up = cos_lat * cos_lon * d[0] + cos_lat * sin_lon * d[1] + sin_lat * d[2];

    LookAngles {
        azimuth: east.atan2(north).to_degrees().rem_euclid(360.0),
        elevation: up.atan2(east.hypot(north)).to_degrees(),
    }
}

/// Visibility backend comparing the satellite elevation with the station mask.
///
/// The ephemeris is resampled at the interpolation step, the elevation margin
/// over the mask is evaluated at every resampled epoch, and window edges are
/// placed at the linearly interpolated zero crossing of that margin, rounded
/// to the millisecond.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElevationVisibility;

impl ElevationVisibility {
    fn resample(
        ephemeris: &Ephemeris,
        target: &TimeHorizon,
        method: InterpolationMethod,
    ) -> Vec<[f64; 3]> {
        let source = &ephemeris.horizon;
        if source.step() == target.step() {
            return ephemeris.samples.iter().map(StateSample::position).collect();
        }

        let step_ms = source.step_ms();
        let step_s = step_ms as f64 / 1_000.0;
        let last = ephemeris.samples.len() - 1;

        target
            .epochs()
            .map(|epoch| {
                let offset_ms = (epoch - source.start()).num_milliseconds();
                let index = (offset_ms / step_ms) as usize;
                if index >= last {
                    return ephemeris.samples[last].position();
                }
                let s = (offset_ms % step_ms) as f64 / step_ms as f64;
                let (p0, p1) = (&ephemeris.samples[index], &ephemeris.samples[index + 1]);
                match method {
                    InterpolationMethod::Linear => lerp(p0.position(), p1.position(), s),
                    InterpolationMethod::Cubic => hermite(p0, p1, s, step_s),
                }
            })
            .collect()
    }
}

impl EligibilityComputation for ElevationVisibility {
    fn compute(
        &self,
        ephemeris: &Ephemeris,
        location: &GroundLocation,
        mask: &ElevationMask,
        settings: &InterpolationSettings,
    ) -> Result<Vec<VisibilityWindow>, ComputeError> {
        if ephemeris.samples.len() != ephemeris.horizon.sample_count() {
            return Err(ComputeError::Visibility(format!(
                "ephemeris has {} samples for a horizon of {} epochs",
                ephemeris.samples.len(),
                ephemeris.horizon.sample_count()
            )));
        }
        let target = ephemeris
            .horizon
            .with_step(settings.step)
            .map_err(|e| ComputeError::Visibility(e.to_string()))?;

        let margins: Vec<f64> = Self::resample(ephemeris, &target, settings.method)
            .into_iter()
            .map(|position| {
                let look = look_angles(location, position);
                look.elevation - mask.min_elevation(look.azimuth)
            })
            .collect();

        Ok(windows_from_margins(&target, &margins))
    }
}

fn lerp(a: [f64; 3], b: [f64; 3], s: f64) -> [f64; 3] {
    [
        a[0] + s * (b[0] - a[0]),
        a[1] + s * (b[1] - a[1]),
        a[2] + s * (b[2] - a[2]),
    ]
}

/// Cubic Hermite position between two states `step_s` seconds apart.
fn hermite(p0: &StateSample, p1: &StateSample, s: f64, step_s: f64) -> [f64; 3] {
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;

    let (r0, v0, r1, v1) = (p0.position(), p0.velocity(), p1.position(), p1.velocity());
    std::array::from_fn(|k| {
        h00 * r0[k] + h10 * step_s * v0[k] + h01 * r1[k] + h11 * step_s * v1[k]
    })
}

/// Windows where `margins[k] >= 0`, with `margins[k]` taken at `horizon.epoch(k)`.
fn windows_from_margins(horizon: &TimeHorizon, margins: &[f64]) -> Vec<VisibilityWindow> {
    let crossing = |k: usize| -> DateTime<Utc> {
        let (a, b) = (margins[k], margins[k + 1]);
        let fraction = (a / (a - b)).clamp(0.0, 1.0);
        horizon.epoch(k)
            + Duration::milliseconds((fraction * horizon.step_ms() as f64).round() as i64)
    };

    let mut windows = Vec::new();
    let mut open: Option<DateTime<Utc>> = None;
    for (k, margin) in margins.iter().enumerate() {
        let visible = *margin >= 0.0;
        match (open, visible) {
            (None, true) => {
                open = Some(if k == 0 {
                    horizon.start()
                } else {
                    crossing(k - 1)
                });
            }
            (Some(start), false) => {
                windows.push(VisibilityWindow::new(start, crossing(k - 1)));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        windows.push(VisibilityWindow::new(
            start,
            horizon.epoch(margins.len() - 1),
        ));
    }
    windows
}
