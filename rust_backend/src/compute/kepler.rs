//! Two-body propagation of classical orbital elements.

use chrono::{DateTime, Utc};

use super::{ComputeError, Propagator};
use crate::models::{Satellite, SatelliteOrbit, StateSample, TimeHorizon};

/// Standard gravitational parameter of the Earth, km^3/s^2.
pub const EARTH_MU: f64 = 398_600.441_8;

const KEPLER_TOLERANCE: f64 = 1e-12;
const KEPLER_MAX_ITERATIONS: usize = 50;

/// Unperturbed Keplerian propagator producing inertial states.
#[derive(Debug, Clone, Copy)]
pub struct KeplerPropagator {
    mu: f64,
}

impl Default for KeplerPropagator {
    fn default() -> Self {
        Self { mu: EARTH_MU }
    }
}

impl KeplerPropagator {
    pub fn with_mu(mu: f64) -> Self {
        Self { mu }
    }

    /// Inertial state of `orbit` at `instant`.
    pub fn state_at(
        &self,
        orbit: &SatelliteOrbit,
        instant: DateTime<Utc>,
    ) -> Result<StateSample, String> {
        let a = orbit.semi_major_axis;
        let e = orbit.eccentricity;
        if !(a > 0.0) {
            return Err(format!("semi-major axis must be positive, got {}", a));
        }
        if !(0.0..1.0).contains(&e) {
            return Err(format!("only closed orbits are supported, eccentricity {}", e));
        }

        let mean_motion = (self.mu / (a * a * a)).sqrt();
        let nu0 = orbit.true_anomaly.to_radians();
        let e0 = eccentric_from_true(nu0, e);
        let m0 = e0 - e * e0.sin();

        let dt = (instant - orbit.epoch).num_milliseconds() as f64 / 1_000.0;
        let m = (m0 + mean_motion * dt).rem_euclid(std::f64::consts::TAU);
        let ecc = solve_kepler(m, e)?;

        let radius = a * (1.0 - e * ecc.cos());
        let nu = 2.0 * ((1.0 + e).sqrt() * (ecc / 2.0).sin())
            .atan2((1.0 - e).sqrt() * (ecc / 2.0).cos());
        let (sin_nu, cos_nu) = nu.sin_cos();

        let p = a * (1.0 - e * e);
        let speed = (self.mu / p).sqrt();
        let r_pf = [radius * cos_nu, radius * sin_nu];
        let v_pf = [-speed * sin_nu, speed * (e + cos_nu)];

        let rot = perifocal_to_inertial(
            orbit.raan.to_radians(),
            orbit.inclination.to_radians(),
            orbit.argument_of_perigee.to_radians(),
        );
        let apply = |v: [f64; 2]| -> [f64; 3] {
            [
                rot[0][0] * v[0] + rot[0][1] * v[1],
                rot[1][0] * v[0] + rot[1][1] * v[1],
                rot[2][0] * v[0] + rot[2][1] * v[1],
            ]
        };

        Ok(StateSample::new(apply(r_pf), apply(v_pf)))
    }
}

impl Propagator for KeplerPropagator {
    fn propagate(
        &self,
        satellite: &Satellite,
        horizon: &TimeHorizon,
    ) -> Result<Vec<StateSample>, ComputeError> {
        horizon
            .epochs()
            .map(|epoch| {
                self.state_at(&satellite.orbit, epoch)
                    .map_err(|message| ComputeError::Propagation {
                        satellite: satellite.name.clone(),
                        message,
                    })
            })
            .collect()
    }
}

fn eccentric_from_true(nu: f64, e: f64) -> f64 {
    2.0 * ((1.0 - e).sqrt() * (nu / 2.0).sin()).atan2((1.0 + e).sqrt() * (nu / 2.0).cos())
}

/// Newton iteration on `M = E - e sin E`.
fn solve_kepler(mean_anomaly: f64, e: f64) -> Result<f64, String> {
    let mut ecc = if e < 0.8 {
        mean_anomaly
    } else {
        std::f64::consts::PI
    };
    for _ in 0..KEPLER_MAX_ITERATIONS {
        let f = ecc - e * ecc.sin() - mean_anomaly;
        let delta = f / (1.0 - e * ecc.cos());
        ecc -= delta;
        if delta.abs() < KEPLER_TOLERANCE {
            return Ok(ecc);
        }
    }
    Err(format!(
        "Kepler equation did not converge for M={} e={}",
        mean_anomaly, e
    ))
}

/// First two columns of `Rz(raan) * Rx(inc) * Rz(argp)`; the third is never
/// needed because perifocal vectors have no out-of-plane component.
fn perifocal_to_inertial(raan: f64, inc: f64, argp: f64) -> [[f64; 2]; 3] {
    let (so, co) = raan.sin_cos();
    let (si, ci) = inc.sin_cos();
    let (sw, cw) = argp.sin_cos();
    [
        [co * cw - so * sw * ci, -co * sw - so * cw * ci],
        [so * cw + co * sw * ci, -so * sw + co * cw * ci],
        [sw * si, cw * si],
    ]
}
