//! Type conversions between request DTOs and service-layer types.
//!
//! ## Conversion Strategy
//!
//! - `TryFrom<ApiRequest> for ServiceBatch`: fallible, validation errors are
//!   reported as [`ServiceError::Validation`]
//! - `From<ServiceOutcome> for ApiResponse`: infallible
//! - [`parse_json`]: deserialization with the JSON path of the first error

use chrono::Duration;
use serde::de::DeserializeOwned;

use super::types as api;
use crate::models::{ElevationMask, StateSample};
use crate::services::{
    EligibilityBatch, EligibilityOutcome, EphemerisBatch, EphemerisOutcome, SatelliteEphemeris,
    ServiceError,
};

/// Deserialize a request document, reporting where it is malformed.
pub fn parse_json<T: DeserializeOwned>(json: &str) -> Result<T, ServiceError> {
    let deserializer = &mut serde_json::Deserializer::from_str(json);
    serde_path_to_error::deserialize(deserializer).map_err(|e| ServiceError::InvalidRequest {
        path: e.path().to_string(),
        message: e.inner().to_string(),
    })
}

// =========================================================
// Eligibilities
// =========================================================

impl TryFrom<&api::StationMaskSpec> for ElevationMask {
    type Error = ServiceError;

    fn try_from(spec: &api::StationMaskSpec) -> Result<Self, Self::Error> {
        match (&spec.azimuths_deg, &spec.elevations_deg) {
            (None, api::Elevations::Constant(elevation)) => Ok(ElevationMask::constant(*elevation)),
            (None, api::Elevations::Table(_)) => Err(ServiceError::validation(format!(
                "station {}: cannot specify multiple elevations without azimuths",
                spec.station_id
            ))),
            (Some(azimuths), api::Elevations::Table(elevations)) => {
                ElevationMask::new(azimuths.clone(), elevations.clone()).map_err(|e| {
                    ServiceError::validation(format!("station {}: {}", spec.station_id, e))
                })
            }
            (Some(azimuths), api::Elevations::Constant(_)) => {
                Err(ServiceError::validation(format!(
                    "station {}: azimuths and elevations should contain the same number of values ({} vs 1)",
                    spec.station_id,
                    azimuths.len()
                )))
            }
        }
    }
}

impl TryFrom<api::EligibilityRequest> for EligibilityBatch {
    type Error = ServiceError;

    fn try_from(request: api::EligibilityRequest) -> Result<Self, Self::Error> {
        let station_masks = request
            .station_with_masks
            .iter()
            .map(|spec| Ok((spec.station_id, ElevationMask::try_from(spec)?)))
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let interpolation_step = match request.step_ms {
            Some(ms) if ms <= 0 => {
                return Err(ServiceError::validation(format!(
                    "interpolation step must be positive, got {}ms",
                    ms
                )))
            }
            Some(ms) => Some(Duration::milliseconds(ms)),
            None => None,
        };

        Ok(EligibilityBatch {
            satellite_ids: request.satellite_ids,
            station_masks,
            horizon: request.horizon,
            interpolation_step,
            cache: request.cache,
            backend: request.backend,
        })
    }
}

impl From<EligibilityOutcome> for api::EligibilityResponse {
    fn from(outcome: EligibilityOutcome) -> Self {
        api::EligibilityResponse {
            horizon: outcome.horizon,
            step_ms: outcome.interpolation_step.num_milliseconds(),
            backend: outcome.backend,
            links: outcome
                .links
                .into_iter()
                .map(|link| api::LinkResult {
                    satellite_id: link.satellite_id,
                    station_id: link.station_id,
                    source: link.source,
                    eligibilities: link.intervals,
                })
                .collect(),
        }
    }
}

// =========================================================
// Ephemeris
// =========================================================

impl From<api::EphemerisRequest> for EphemerisBatch {
    fn from(request: api::EphemerisRequest) -> Self {
        EphemerisBatch {
            satellite_ids: request.satellite_ids,
            horizon: request.horizon,
            cache: request.cache,
        }
    }
}

fn ephemeris_data(entry: &SatelliteEphemeris, with_velocity: bool) -> api::EphemerisData {
    let samples = &entry.ephemeris.samples;
    let column = |f: fn(&StateSample) -> f64| -> Vec<f64> { samples.iter().map(f).collect() };

    api::EphemerisData {
        ephemeris_id: entry.ephemeris.id,
        source: entry.source,
        position: api::EphemerisPosition {
            x_km: column(|s| s.x),
            y_km: column(|s| s.y),
            z_km: column(|s| s.z),
        },
        velocity: with_velocity.then(|| api::EphemerisVelocity {
            dx_km_per_s: column(|s| s.vx),
            dy_km_per_s: column(|s| s.vy),
            dz_km_per_s: column(|s| s.vz),
        }),
    }
}

impl api::EphemerisResponse {
    pub fn from_outcome(outcome: &EphemerisOutcome, with_velocity: bool) -> Self {
        api::EphemerisResponse {
            horizon: outcome.horizon,
            velocity: with_velocity,
            ephemeris: outcome
                .ephemerides
                .iter()
                .map(|(id, entry)| (*id, ephemeris_data(entry, with_velocity)))
                .collect(),
        }
    }
}
