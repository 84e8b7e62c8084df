//! Cached ephemeris lookups.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{Ephemeris, EphemerisId, SatelliteId, TimeHorizon};

/// Read side of the ephemeris cache. Writes go through a
/// [`UnitOfWork`](crate::db::UnitOfWork).
#[async_trait]
pub trait EphemerisRepository: Send + Sync {
    /// Find a stored ephemeris that serves `horizon` for a satellite.
    ///
    /// A record serves the request when its step equals `horizon.step()` and
    /// its range contains `[horizon.start(), horizon.end()]`. Among several
    /// such records the one with the lowest id wins.
    ///
    /// # Returns
    /// * `Ok(Some(Ephemeris))` - With `shrink`, exactly the samples of
    ///   `horizon`, relabeled with it. Without, the whole stored record.
    /// * `Ok(None)` - No covering record
    /// * `Err(RepositoryError::MisalignedHorizon)` - `horizon.start()` is off
    ///   the record's sampling grid
    /// * `Err(RepositoryError::CorruptData)` - Stored blob has the wrong length
    async fn extract_ephemeris(
        &self,
        satellite_id: SatelliteId,
        horizon: &TimeHorizon,
        shrink: bool,
    ) -> RepositoryResult<Option<Ephemeris>>;

    /// Load a stored ephemeris record in full.
    async fn load_ephemeris(&self, id: EphemerisId) -> RepositoryResult<Ephemeris>;

    /// Every distinct horizon cached for a satellite, ordered by start, end
    /// and step.
    async fn list_horizons(&self, satellite_id: SatelliteId) -> RepositoryResult<Vec<TimeHorizon>>;
}
