//! Batched, cache-aware eligibility computation.
//!
//! For one request the orchestrator:
//! 1. resolves every satellite and station, rejecting unknown ids
//! 2. looks up all `(satellite, station)` pairs in one batched cache read
//! 3. for each satellite with missing pairs, reuses a covering cached
//!    ephemeris or propagates a new one
//! 4. computes the missing visibility windows
//! 5. commits the new ephemerides and groups in a single unit of work
//!
//! A commit rejected by a uniqueness constraint means a concurrent request
//! cached the same entries first. The orchestrator then repeats the cache
//! reads, recomputes only what is still missing and commits again, up to
//! `max_commit_attempts` times.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Duration;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::ephemeris::load_satellites;
use super::{ServiceError, ServiceResult};
use crate::codec::{mask as mask_codec, MaskKey};
use crate::compute::{
    EarthRotation, EligibilityComputation, FrameConversion, InterpolationSettings,
    KeplerPropagator, Propagator, VisibilityBackends,
};
use crate::db::{
    services as db_services, CommitReport, ComputeSettings, EligibilityQuery, EphemerisRef,
    FullRepository, UnitOfWork,
};
use crate::models::{
    Eligibility, ElevationMask, Ephemeris, Satellite, SatelliteId, Station, StationId,
    TimeHorizon, VisibilityWindow,
};

/// Eligibility request in domain terms.
#[derive(Debug, Clone)]
pub struct EligibilityBatch {
    pub satellite_ids: Vec<SatelliteId>,
    /// Mask per station. A station listed twice keeps its last mask.
    pub station_masks: Vec<(StationId, ElevationMask)>,
    pub horizon: TimeHorizon,
    /// Defaults to the horizon step.
    pub interpolation_step: Option<Duration>,
    /// Defaults to [`ComputeSettings::cache_enabled`].
    pub cache: Option<bool>,
    /// Defaults to [`ComputeSettings::default_backend`].
    pub backend: Option<String>,
}

/// Where the intervals of one link came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkSource {
    Cached,
    Computed,
}

/// Intervals of one satellite/station pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkEligibilities {
    pub satellite_id: SatelliteId,
    pub station_id: StationId,
    pub source: LinkSource,
    pub intervals: Vec<Eligibility>,
}

#[derive(Debug, Clone)]
pub struct EligibilityOutcome {
    pub horizon: TimeHorizon,
    pub interpolation_step: Duration,
    pub backend: String,
    /// One entry per requested pair, satellites outermost, both in request
    /// order.
    pub links: Vec<LinkEligibilities>,
    /// Ids written by the final commit; empty with caching disabled.
    pub committed: CommitReport,
    pub commit_attempts: u32,
}

impl EligibilityOutcome {
    /// Every interval of the response, link by link.
    pub fn eligibilities(&self) -> impl Iterator<Item = &Eligibility> {
        self.links.iter().flat_map(|link| link.intervals.iter())
    }

    pub fn cached_links(&self) -> usize {
        self.links
            .iter()
            .filter(|link| link.source == LinkSource::Cached)
            .count()
    }
}

/// A station of the request with its mask and the mask's cache key.
struct StationTarget {
    station: Station,
    mask: ElevationMask,
    key: MaskKey,
}

/// Request after defaults are applied and every id is resolved.
struct ResolvedBatch {
    satellites: Vec<Satellite>,
    stations: Vec<(StationId, StationTarget)>,
    horizon: TimeHorizon,
    interpolation_step: Duration,
    cache: bool,
    backend: String,
}

impl ResolvedBatch {
    fn query(&self) -> EligibilityQuery {
        EligibilityQuery {
            satellites: self.satellites.iter().filter_map(|s| s.id).collect(),
            station_masks: self
                .stations
                .iter()
                .map(|(id, target)| (*id, target.key.clone()))
                .collect(),
            horizon: self.horizon,
            interpolation_step: self.interpolation_step,
            backend: self.backend.clone(),
            shrink: true,
        }
    }
}

type ResolvedLinks = HashMap<(SatelliteId, StationId), LinkEligibilities>;

/// Drives propagation, visibility and caching for batched requests.
#[derive(Clone)]
pub struct BatchComputeOrchestrator {
    propagator: Arc<dyn Propagator>,
    frames: Arc<dyn FrameConversion>,
    backends: VisibilityBackends,
    settings: ComputeSettings,
}

impl BatchComputeOrchestrator {
    pub fn new(
        propagator: Arc<dyn Propagator>,
        frames: Arc<dyn FrameConversion>,
        backends: VisibilityBackends,
        settings: ComputeSettings,
    ) -> Self {
        Self {
            propagator,
            frames,
            backends,
            settings,
        }
    }

    /// Orchestrator backed by the reference capabilities of
    /// [`crate::compute`].
    pub fn with_defaults(settings: ComputeSettings) -> Self {
        Self::new(
            Arc::new(KeplerPropagator::default()),
            Arc::new(EarthRotation),
            VisibilityBackends::default(),
            settings,
        )
    }

    pub fn settings(&self) -> &ComputeSettings {
        &self.settings
    }

    pub fn backends(&self) -> &VisibilityBackends {
        &self.backends
    }

    pub(crate) fn cache_enabled(&self, requested: Option<bool>) -> bool {
        requested.unwrap_or(self.settings.cache_enabled)
    }

    pub(crate) fn max_commit_attempts(&self) -> u32 {
        self.settings.max_commit_attempts.max(1)
    }

    /// Earth-fixed ephemeris of `satellite` over `horizon`, freshly computed.
    pub(crate) fn propagate(
        &self,
        satellite: &Satellite,
        horizon: &TimeHorizon,
    ) -> ServiceResult<Ephemeris> {
        let satellite_id = satellite.id.ok_or_else(|| {
            ServiceError::validation(format!("satellite '{}' is not registered", satellite.name))
        })?;
        let inertial = self.propagator.propagate(satellite, horizon)?;
        let fixed = self.frames.inertial_to_fixed(horizon, &inertial)?;
        Ok(Ephemeris::new(satellite_id, *horizon, fixed))
    }

    /// Visibility intervals for every satellite/station pair of `batch`.
    ///
    /// # Errors
    /// * [`ServiceError::Validation`] - unknown satellite, station or backend,
    ///   or an interpolation step that is not a positive whole number of
    ///   milliseconds
    /// * [`ServiceError::Repository`] - storage failures, including a
    ///   uniqueness violation that persists after every commit attempt
    /// * [`ServiceError::Compute`] - propagation or visibility failures
    pub async fn compute_eligibilities<R>(
        &self,
        repo: &R,
        batch: &EligibilityBatch,
    ) -> ServiceResult<EligibilityOutcome>
    where
        R: FullRepository + ?Sized,
    {
        let resolved = self.resolve(repo, batch).await?;
        let visibility = self
            .backends
            .get(&resolved.backend)
            .map_err(|e| ServiceError::validation(e.to_string()))?
            .clone();

        info!(
            "Computing eligibilities for {} satellites x {} stations over {} (step {}ms, backend {}, cache {})",
            resolved.satellites.len(),
            resolved.stations.len(),
            resolved.horizon,
            resolved.interpolation_step.num_milliseconds(),
            resolved.backend,
            if resolved.cache { "on" } else { "off" }
        );

        let query = resolved.query();
        let mut links = ResolvedLinks::new();
        let mut attempts = 0;
        let committed = loop {
            attempts += 1;
            if resolved.cache {
                self.collect_cached(repo, &query, &mut links).await?;
            }

            let (unit, computed) = self
                .compute_missing(repo, &resolved, visibility.as_ref(), &links)
                .await?;

            if !resolved.cache || unit.is_empty() {
                links.extend(computed);
                break CommitReport::default();
            }

            match repo.commit(unit).await {
                Ok(report) => {
                    links.extend(computed);
                    break report;
                }
                Err(e) if e.is_unique_violation() && attempts < self.max_commit_attempts() => {
                    warn!(
                        "Commit attempt {} lost a race against a concurrent writer, reconciling: {}",
                        attempts, e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        };

        let links = order_links(&resolved, links);
        let outcome = EligibilityOutcome {
            horizon: resolved.horizon,
            interpolation_step: resolved.interpolation_step,
            backend: resolved.backend,
            links,
            committed,
            commit_attempts: attempts,
        };
        info!(
            "Resolved {} links ({} from cache), stored {} ephemerides and {} groups",
            outcome.links.len(),
            outcome.cached_links(),
            outcome.committed.ephemeris_ids.len(),
            outcome.committed.group_ids.len()
        );
        Ok(outcome)
    }

    async fn resolve<R>(&self, repo: &R, batch: &EligibilityBatch) -> ServiceResult<ResolvedBatch>
    where
        R: FullRepository + ?Sized,
    {
        let interpolation_step = batch
            .interpolation_step
            .unwrap_or_else(|| batch.horizon.step());
        batch
            .horizon
            .with_step(interpolation_step)
            .map_err(|e| ServiceError::validation(format!("invalid interpolation step: {}", e)))?;

        let satellites = load_satellites(repo, &batch.satellite_ids).await?;

        let mut stations: Vec<(StationId, StationTarget)> = Vec::new();
        for (id, mask) in &batch.station_masks {
            let key = mask_codec::encode(mask);
            if let Some((_, target)) = stations.iter_mut().find(|(sid, _)| sid == id) {
                target.mask = mask.clone();
                target.key = key;
                continue;
            }
            let station = db_services::load_entity(repo, *id)
                .await?
                .ok_or_else(|| ServiceError::validation(format!("station {} not found", id)))?;
            stations.push((
                *id,
                StationTarget {
                    station,
                    mask: mask.clone(),
                    key,
                },
            ));
        }

        Ok(ResolvedBatch {
            satellites,
            stations,
            horizon: batch.horizon,
            interpolation_step,
            cache: self.cache_enabled(batch.cache),
            backend: batch
                .backend
                .clone()
                .unwrap_or_else(|| self.settings.default_backend.clone()),
        })
    }

    /// Record every cache hit of `query` not already resolved.
    async fn collect_cached<R>(
        &self,
        repo: &R,
        query: &EligibilityQuery,
        links: &mut ResolvedLinks,
    ) -> ServiceResult<()>
    where
        R: FullRepository + ?Sized,
    {
        let lookup = repo.extract_eligibilities(query).await?;
        let mut hits = 0;
        for ((satellite_id, station_id), found) in lookup {
            let Some(intervals) = found else { continue };
            hits += 1;
            links
                .entry((satellite_id, station_id))
                .or_insert(LinkEligibilities {
                    satellite_id,
                    station_id,
                    source: LinkSource::Cached,
                    intervals,
                });
        }
        debug!(
            "Eligibility cache: {} of {} pairs hit",
            hits,
            query.satellites.len() * query.station_masks.len()
        );
        Ok(())
    }

    /// Compute every unresolved pair, staging the results when caching.
    async fn compute_missing<R>(
        &self,
        repo: &R,
        batch: &ResolvedBatch,
        visibility: &dyn EligibilityComputation,
        links: &ResolvedLinks,
    ) -> ServiceResult<(UnitOfWork, ResolvedLinks)>
    where
        R: FullRepository + ?Sized,
    {
        let mut unit = UnitOfWork::new();
        let mut computed = ResolvedLinks::new();
        let settings = InterpolationSettings {
            step: batch.interpolation_step,
            method: self.settings.interpolation,
        };

        for satellite in &batch.satellites {
            let Some(satellite_id) = satellite.id else {
                continue;
            };
            let missing: Vec<_> = batch
                .stations
                .iter()
                .filter(|(station_id, _)| !links.contains_key(&(satellite_id, *station_id)))
                .collect();
            if missing.is_empty() {
                continue;
            }

            // A covering record is used whole so that the groups computed from
            // it span its entire horizon.
            let cached = if batch.cache {
                db_services::extract_ephemeris(repo, satellite_id, &batch.horizon, false).await?
            } else {
                None
            };
            let ephemeris = match cached {
                Some(ephemeris) => ephemeris,
                None => self.propagate(satellite, &batch.horizon)?,
            };
            let ephemeris_ref: Option<EphemerisRef> = if batch.cache {
                Some(unit.stage_ephemeris(&ephemeris)?)
            } else {
                None
            };

            for (station_id, target) in missing {
                let windows = visibility.compute(
                    &ephemeris,
                    &target.station.location,
                    &target.mask,
                    &settings,
                )?;
                let intervals = within_horizon(satellite_id, *station_id, &windows, &batch.horizon);

                if let Some(ephemeris_ref) = ephemeris_ref {
                    unit.create_group(
                        ephemeris_ref,
                        *station_id,
                        windows,
                        target.key.clone(),
                        batch.interpolation_step,
                        batch.backend.clone(),
                    )?;
                }
                computed.insert(
                    (satellite_id, *station_id),
                    LinkEligibilities {
                        satellite_id,
                        station_id: *station_id,
                        source: LinkSource::Computed,
                        intervals,
                    },
                );
            }
        }

        Ok((unit, computed))
    }
}

/// Computed windows as returned to the caller: only those lying entirely
/// inside the requested horizon, the same rule cached reads apply.
fn within_horizon(
    satellite_id: SatelliteId,
    station_id: StationId,
    windows: &[VisibilityWindow],
    horizon: &TimeHorizon,
) -> Vec<Eligibility> {
    windows
        .iter()
        .filter(|w| w.start >= horizon.start() && w.end <= horizon.end())
        .map(|w| Eligibility {
            id: None,
            satellite_id,
            station_id,
            start: w.start,
            end: w.end,
        })
        .collect()
}

fn order_links(batch: &ResolvedBatch, mut links: ResolvedLinks) -> Vec<LinkEligibilities> {
    let order: BTreeMap<(usize, usize), (SatelliteId, StationId)> = batch
        .satellites
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.id.map(|id| (i, id)))
        .flat_map(|(i, satellite_id)| {
            batch
                .stations
                .iter()
                .enumerate()
                .map(move |(j, (station_id, _))| ((i, j), (satellite_id, *station_id)))
        })
        .collect();
    order
        .into_values()
        .filter_map(|pair| links.remove(&pair))
        .collect()
}
