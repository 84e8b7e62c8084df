//! Cache-aware ephemeris computation and horizon listings.

use std::collections::{BTreeMap, HashSet};

use log::{info, warn};

use super::eligibility::{BatchComputeOrchestrator, LinkSource};
use super::{ServiceError, ServiceResult};
use crate::db::{services as db_services, CommitReport, FullRepository, UnitOfWork};
use crate::models::{Constellation, Ephemeris, Satellite, SatelliteId, TimeHorizon};

#[derive(Debug, Clone)]
pub struct EphemerisBatch {
    pub satellite_ids: Vec<SatelliteId>,
    pub horizon: TimeHorizon,
    /// Defaults to the orchestrator's cache setting.
    pub cache: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteEphemeris {
    pub source: LinkSource,
    /// Samples of exactly the requested horizon.
    pub ephemeris: Ephemeris,
}

#[derive(Debug, Clone)]
pub struct EphemerisOutcome {
    pub horizon: TimeHorizon,
    pub ephemerides: BTreeMap<SatelliteId, SatelliteEphemeris>,
    pub committed: CommitReport,
}

impl BatchComputeOrchestrator {
    /// Earth-fixed ephemeris of every requested satellite over the horizon.
    ///
    /// Cached records covering the horizon are shrunk to it; the others are
    /// propagated and, when caching, stored together in one commit.
    ///
    /// # Errors
    /// * [`ServiceError::Validation`] - unknown satellite
    /// * [`ServiceError::Repository`] - storage failures, including a cached
    ///   record whose grid the requested start is not on
    /// * [`ServiceError::Compute`] - propagation failures
    pub async fn compute_ephemeris<R>(
        &self,
        repo: &R,
        batch: &EphemerisBatch,
    ) -> ServiceResult<EphemerisOutcome>
    where
        R: FullRepository + ?Sized,
    {
        let satellites = load_satellites(repo, &batch.satellite_ids).await?;
        let cache = self.cache_enabled(batch.cache);
        info!(
            "Computing ephemeris for {} satellites over {} (cache {})",
            satellites.len(),
            batch.horizon,
            if cache { "on" } else { "off" }
        );

        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut ephemerides = BTreeMap::new();
            let mut unit = UnitOfWork::new();
            let mut staged = Vec::new();

            for satellite in &satellites {
                let Some(satellite_id) = satellite.id else {
                    continue;
                };
                let cached = if cache {
                    db_services::extract_ephemeris(repo, satellite_id, &batch.horizon, true)
                        .await?
                } else {
                    None
                };
                let entry = match cached {
                    Some(ephemeris) => SatelliteEphemeris {
                        source: LinkSource::Cached,
                        ephemeris,
                    },
                    None => {
                        let ephemeris = self.propagate(satellite, &batch.horizon)?;
                        if cache {
                            unit.stage_ephemeris(&ephemeris)?;
                            staged.push(satellite_id);
                        }
                        SatelliteEphemeris {
                            source: LinkSource::Computed,
                            ephemeris,
                        }
                    }
                };
                ephemerides.insert(satellite_id, entry);
            }

            if unit.is_empty() {
                return Ok(EphemerisOutcome {
                    horizon: batch.horizon,
                    ephemerides,
                    committed: CommitReport::default(),
                });
            }

            match repo.commit(unit).await {
                Ok(committed) => {
                    for (satellite_id, id) in staged.iter().zip(&committed.ephemeris_ids) {
                        if let Some(entry) = ephemerides.get_mut(satellite_id) {
                            entry.ephemeris.id = Some(*id);
                        }
                    }
                    info!(
                        "Stored {} new ephemerides over {}",
                        committed.ephemeris_ids.len(),
                        batch.horizon
                    );
                    return Ok(EphemerisOutcome {
                        horizon: batch.horizon,
                        ephemerides,
                        committed,
                    });
                }
                Err(e) if e.is_unique_violation() && attempts < self.max_commit_attempts() => {
                    warn!(
                        "Ephemeris commit attempt {} lost a race against a concurrent writer, reconciling: {}",
                        attempts, e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Horizons cached for every satellite of the set; unknown satellites are a
/// validation error.
pub async fn common_horizons<R>(
    repo: &R,
    satellite_ids: &[SatelliteId],
) -> ServiceResult<Vec<TimeHorizon>>
where
    R: FullRepository + ?Sized,
{
    load_satellites(repo, satellite_ids).await?;
    Ok(db_services::common_horizons(repo, satellite_ids).await?)
}

/// Horizons cached for every satellite of a constellation. A constellation
/// with an unregistered satellite has none.
pub async fn constellation_horizons<R>(
    repo: &R,
    constellation: &Constellation,
) -> ServiceResult<Vec<TimeHorizon>>
where
    R: FullRepository + ?Sized,
{
    let ids: Option<Vec<SatelliteId>> = constellation.satellites().iter().map(|s| s.id).collect();
    match ids {
        Some(ids) => Ok(db_services::common_horizons(repo, &ids).await?),
        None => Ok(Vec::new()),
    }
}

/// Horizons cached for every satellite of every constellation of a system.
/// As for a single constellation, an unregistered satellite means none.
pub async fn system_horizons<R>(
    repo: &R,
    constellations: &[Constellation],
) -> ServiceResult<Vec<TimeHorizon>>
where
    R: FullRepository + ?Sized,
{
    let ids: Option<Vec<SatelliteId>> = constellations
        .iter()
        .flat_map(|c| c.satellites())
        .map(|s| s.id)
        .collect();
    match ids {
        Some(ids) => Ok(db_services::common_horizons(repo, &ids).await?),
        None => Ok(Vec::new()),
    }
}

/// Load each distinct satellite once, in request order.
pub(super) async fn load_satellites<R>(repo: &R, ids: &[SatelliteId]) -> ServiceResult<Vec<Satellite>>
where
    R: FullRepository + ?Sized,
{
    let mut seen = HashSet::new();
    let mut satellites = Vec::with_capacity(ids.len());
    for &id in ids {
        if !seen.insert(id) {
            continue;
        }
        let satellite = db_services::load_entity(repo, id)
            .await?
            .ok_or_else(|| ServiceError::validation(format!("satellite {} not found", id)))?;
        satellites.push(satellite);
    }
    Ok(satellites)
}
