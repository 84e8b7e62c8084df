//! Cached eligibility group lookups.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Duration;

use super::error::RepositoryResult;
use crate::codec::MaskKey;
use crate::models::{Eligibility, EligibilityGroup, SatelliteId, StationId, TimeHorizon};

/// Batched eligibility lookup over `satellites x station_masks`.
#[derive(Debug, Clone)]
pub struct EligibilityQuery {
    pub satellites: Vec<SatelliteId>,
    pub station_masks: BTreeMap<StationId, MaskKey>,
    /// Governs which ephemeris records qualify (same rule as ephemeris
    /// extraction, on the horizon step).
    pub horizon: TimeHorizon,
    /// Step the visibility computation was interpolated at.
    pub interpolation_step: Duration,
    pub backend: String,
    pub shrink: bool,
}

impl EligibilityQuery {
    pub fn interpolation_step_ms(&self) -> i64 {
        self.interpolation_step.num_milliseconds()
    }

    /// Every `(satellite, station)` pair the query asks about.
    pub fn pairs(&self) -> impl Iterator<Item = (SatelliteId, StationId)> + '_ {
        self.satellites
            .iter()
            .flat_map(move |&sat| self.station_masks.keys().map(move |&st| (sat, st)))
    }
}

/// Outcome per pair: `Some(intervals)` on a cache hit (possibly empty),
/// `None` when no group matches.
pub type EligibilityLookup = HashMap<(SatelliteId, StationId), Option<Vec<Eligibility>>>;

#[async_trait]
pub trait EligibilityRepository: Send + Sync {
    /// Resolve every pair of the query in one retrieval.
    ///
    /// A pair hits when some group's ephemeris belongs to the satellite and
    /// covers `query.horizon`, and the group's `(station, mask, step,
    /// backend)` equals the query's. When several groups qualify the lowest
    /// group id wins. The returned map has an entry for every pair.
    async fn extract_eligibilities(
        &self,
        query: &EligibilityQuery,
    ) -> RepositoryResult<EligibilityLookup>;

    /// Load one group with its intervals.
    async fn load_group(&self, id: crate::models::EligibilityGroupId)
        -> RepositoryResult<EligibilityGroup>;

    /// All groups computed from any ephemeris of a satellite, ordered by id.
    async fn list_groups(&self, satellite_id: SatelliteId)
        -> RepositoryResult<Vec<EligibilityGroup>>;
}
