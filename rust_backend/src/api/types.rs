//! Request and response Data Transfer Objects (DTOs).
//!
//! These types describe the JSON documents accepted and produced by the
//! cache. They stay flat and use plain numbers for angles and steps; the
//! conversions to domain types live in [`super::conversions`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Eligibility, EphemerisId, SatelliteId, StationId, TimeHorizon};
use crate::services::LinkSource;

// =========================================================
// Eligibilities
// =========================================================

/// Elevation threshold(s) of a station mask: one value for a constant mask,
/// or one value per azimuth threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Elevations {
    Constant(f64),
    Table(Vec<f64>),
}

/// Mask to apply to one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationMaskSpec {
    pub station_id: StationId,
    /// Azimuth thresholds, degrees. Absent for a constant mask.
    #[serde(default)]
    pub azimuths_deg: Option<Vec<f64>>,
    /// Minimum elevations, degrees.
    pub elevations_deg: Elevations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityRequest {
    pub satellite_ids: Vec<SatelliteId>,
    pub station_with_masks: Vec<StationMaskSpec>,
    pub horizon: TimeHorizon,
    /// Interpolation step in milliseconds; defaults to the horizon step.
    #[serde(default)]
    pub step_ms: Option<i64>,
    /// Whether to read and fill the cache; defaults to the configured value.
    #[serde(default)]
    pub cache: Option<bool>,
    /// Visibility backend; defaults to the configured value.
    #[serde(default)]
    pub backend: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkResult {
    pub satellite_id: SatelliteId,
    pub station_id: StationId,
    pub source: LinkSource,
    pub eligibilities: Vec<Eligibility>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityResponse {
    pub horizon: TimeHorizon,
    pub step_ms: i64,
    pub backend: String,
    pub links: Vec<LinkResult>,
}

// =========================================================
// Ephemeris
// =========================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemerisRequest {
    pub satellite_ids: Vec<SatelliteId>,
    pub horizon: TimeHorizon,
    /// Include velocities in the response.
    #[serde(default)]
    pub velocity: bool,
    #[serde(default)]
    pub cache: Option<bool>,
}

/// Earth-fixed position over time, one array per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemerisPosition {
    pub x_km: Vec<f64>,
    pub y_km: Vec<f64>,
    pub z_km: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemerisVelocity {
    pub dx_km_per_s: Vec<f64>,
    pub dy_km_per_s: Vec<f64>,
    pub dz_km_per_s: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemerisData {
    /// Cached record the samples come from, when persisted.
    pub ephemeris_id: Option<EphemerisId>,
    pub source: LinkSource,
    pub position: EphemerisPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<EphemerisVelocity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemerisResponse {
    pub horizon: TimeHorizon,
    pub velocity: bool,
    pub ephemeris: BTreeMap<SatelliteId, EphemerisData>,
}
