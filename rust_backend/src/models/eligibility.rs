//! Visibility windows between a satellite and a ground station.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::MaskKey;

use super::ids::{EligibilityGroupId, EligibilityId, EphemerisId, SatelliteId, StationId};

/// One visibility interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub id: Option<EligibilityId>,
    pub satellite_id: SatelliteId,
    pub station_id: StationId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Raw interval as produced by a visibility backend, before it is attached
/// to a satellite/station pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl VisibilityWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

/// Persisted eligibility group: every interval computed together for one
/// ephemeris/station/mask/step/backend combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityGroup {
    pub id: EligibilityGroupId,
    pub ephemeris_id: EphemerisId,
    pub station_id: StationId,
    pub mask: MaskKey,
    pub step_ms: i64,
    pub backend: String,
    pub intervals: Vec<VisibilityWindow>,
}
