//! In-memory local repository implementation.
//!
//! This module provides a local implementation of all repository traits
//! suitable for unit testing and local development. It enforces the same
//! natural-key uniqueness and cascade rules as the relational schema, so code
//! exercised against it behaves the same against Postgres.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::codec::MaskKey;
use crate::db::coverage::{self, StoredEphemeris, StoredInterval};
use crate::db::repository::*;
use crate::db::unit_of_work::{check_intervals, CommitReport, EphemerisRef, UnitOfWork};
use crate::models::{
    Eligibility, EligibilityGroup, EligibilityGroupId, EligibilityId, Ephemeris, EphemerisId,
    Satellite, SatelliteId, Station, StationId, TimeHorizon, VisibilityWindow,
};

/// In-memory local repository.
///
/// # Example
/// ```
/// use smartlink_rust::db::repositories::LocalRepository;
/// use smartlink_rust::db::repository::TransactionRepository;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let repo = LocalRepository::new();
/// assert!(repo.health_check().await.unwrap());
/// assert_eq!(repo.ephemeris_count(), 0);
/// # });
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

#[derive(Debug, Clone)]
struct GroupRecord {
    ephemeris_id: EphemerisId,
    station_id: StationId,
    mask: MaskKey,
    step_ms: i64,
    backend: String,
    interval_ids: Vec<EligibilityId>,
}

#[derive(Debug, Clone, Copy)]
struct IntervalRecord {
    group_id: EligibilityGroupId,
    start: chrono::DateTime<chrono::Utc>,
    end: chrono::DateTime<chrono::Utc>,
}

struct LocalData {
    satellites: BTreeMap<SatelliteId, Satellite>,
    stations: BTreeMap<StationId, Station>,
    ephemerides: BTreeMap<EphemerisId, StoredEphemeris>,
    groups: BTreeMap<EligibilityGroupId, GroupRecord>,
    intervals: BTreeMap<EligibilityId, IntervalRecord>,

    // ID counters
    next_satellite_id: i64,
    next_station_id: i64,
    next_ephemeris_id: i64,
    next_group_id: i64,
    next_eligibility_id: i64,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            satellites: BTreeMap::new(),
            stations: BTreeMap::new(),
            ephemerides: BTreeMap::new(),
            groups: BTreeMap::new(),
            intervals: BTreeMap::new(),
            next_satellite_id: 1,
            next_station_id: 1,
            next_ephemeris_id: 1,
            next_group_id: 1,
            next_eligibility_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalData {
    fn group_to_model(&self, id: EligibilityGroupId, group: &GroupRecord) -> EligibilityGroup {
        EligibilityGroup {
            id,
            ephemeris_id: group.ephemeris_id,
            station_id: group.station_id,
            mask: group.mask.clone(),
            step_ms: group.step_ms,
            backend: group.backend.clone(),
            intervals: group
                .interval_ids
                .iter()
                .filter_map(|iid| self.intervals.get(iid))
                .map(|iv| VisibilityWindow::new(iv.start, iv.end))
                .collect(),
        }
    }

    fn stored_intervals(&self, group: &GroupRecord) -> Vec<StoredInterval> {
        group
            .interval_ids
            .iter()
            .filter_map(|iid| {
                self.intervals.get(iid).map(|iv| StoredInterval {
                    id: *iid,
                    start: iv.start,
                    end: iv.end,
                })
            })
            .collect()
    }

    fn remove_groups(&mut self, doomed: &[EligibilityGroupId]) {
        for gid in doomed {
            if let Some(group) = self.groups.remove(gid) {
                for iid in group.interval_ids {
                    self.intervals.remove(&iid);
                }
            }
        }
    }

    fn remove_ephemerides(&mut self, doomed: &HashSet<EphemerisId>) {
        let groups: Vec<_> = self
            .groups
            .iter()
            .filter(|(_, g)| doomed.contains(&g.ephemeris_id))
            .map(|(id, _)| *id)
            .collect();
        self.remove_groups(&groups);
        for id in doomed {
            self.ephemerides.remove(id);
        }
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        if let Ok(mut data) = self.data.write() {
            data.is_healthy = healthy;
        }
    }

    /// Clear all data from the repository, keeping the health flag.
    pub fn clear(&self) {
        if let Ok(mut data) = self.data.write() {
            let is_healthy = data.is_healthy;
            *data = LocalData {
                is_healthy,
                ..Default::default()
            };
        }
    }

    /// Get the number of ephemeris records stored.
    pub fn ephemeris_count(&self) -> usize {
        self.data.read().map(|d| d.ephemerides.len()).unwrap_or(0)
    }

    /// Get the number of eligibility groups stored.
    pub fn group_count(&self) -> usize {
        self.data.read().map(|d| d.groups.len()).unwrap_or(0)
    }

    /// Get the number of individual intervals stored.
    pub fn interval_count(&self) -> usize {
        self.data.read().map(|d| d.intervals.len()).unwrap_or(0)
    }

    /// Overwrite the blob of a stored ephemeris, for exercising corruption
    /// handling.
    pub fn replace_ephemeris_data(&self, id: EphemerisId, data: Vec<u8>) -> RepositoryResult<()> {
        let mut guard = self.write()?;
        let record = guard.ephemerides.get_mut(&id).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Ephemeris {} not found", id),
                ErrorContext::new("replace_ephemeris_data").with_entity("ephemeris"),
            )
        })?;
        record.data = data;
        Ok(())
    }

    /// Commit a unit of work synchronously.
    ///
    /// The whole unit is validated under a single write lock before anything
    /// is applied, which makes the commit atomic with respect to other
    /// readers and writers of this repository.
    pub fn commit_impl(&self, unit: UnitOfWork) -> RepositoryResult<CommitReport> {
        self.check_health()?;
        let mut guard = self.write()?;
        let data = &mut *guard;
        let (ephemerides, groups) = unit.into_parts();

        let mut staged_keys: HashSet<(SatelliteId, TimeHorizon)> = HashSet::new();
        for staged in &ephemerides {
            if !data.satellites.contains_key(&staged.satellite_id) {
                return Err(RepositoryError::validation_with_context(
                    format!("Satellite {} is not registered", staged.satellite_id),
                    ErrorContext::new("commit").with_entity("ephemeris"),
                ));
            }
            let duplicate = data.ephemerides.values().any(|e| {
                e.satellite_id == staged.satellite_id && e.horizon == staged.horizon
            });
            if duplicate || !staged_keys.insert((staged.satellite_id, staged.horizon)) {
                return Err(RepositoryError::unique_violation(
                    format!(
                        "ephemeris for satellite {} over {} already exists",
                        staged.satellite_id, staged.horizon
                    ),
                    ErrorContext::new("commit").with_entity("ephemeris"),
                ));
            }
        }

        let mut staged_group_keys = HashSet::new();
        for staged in &groups {
            let context = || {
                ErrorContext::new("commit")
                    .with_entity("eligibility_group")
                    .with_details(format!("station_id={}", staged.station_id))
            };
            let horizon = match staged.ephemeris {
                EphemerisRef::Stored(id) => data.ephemerides.get(&id).map(|e| e.horizon),
                EphemerisRef::Staged(index) => ephemerides.get(index).map(|e| e.horizon),
            }
            .ok_or_else(|| {
                RepositoryError::validation_with_context(
                    format!("group references unknown ephemeris {:?}", staged.ephemeris),
                    context(),
                )
            })?;
            if !data.stations.contains_key(&staged.station_id) {
                return Err(RepositoryError::validation_with_context(
                    format!("Station {} is not registered", staged.station_id),
                    context(),
                ));
            }
            check_intervals(&horizon, &staged.intervals)
                .map_err(|message| RepositoryError::validation_with_context(message, context()))?;

            let duplicate = match staged.ephemeris {
                EphemerisRef::Stored(id) => data.groups.values().any(|g| {
                    g.ephemeris_id == id
                        && g.station_id == staged.station_id
                        && g.mask == staged.mask
                        && g.step_ms == staged.step_ms
                        && g.backend == staged.backend
                }),
                EphemerisRef::Staged(_) => false,
            };
            let key = (
                staged.ephemeris,
                staged.station_id,
                staged.mask.clone(),
                staged.step_ms,
                staged.backend.clone(),
            );
            if duplicate || !staged_group_keys.insert(key) {
                return Err(RepositoryError::unique_violation(
                    format!(
                        "eligibility group for {:?}, station {}, mask {}, step {}ms, backend {} already exists",
                        staged.ephemeris, staged.station_id, staged.mask, staged.step_ms, staged.backend
                    ),
                    context(),
                ));
            }
        }

        let mut report = CommitReport::default();
        for staged in ephemerides {
            let id = EphemerisId(data.next_ephemeris_id);
            data.next_ephemeris_id += 1;
            data.ephemerides.insert(
                id,
                StoredEphemeris {
                    id,
                    satellite_id: staged.satellite_id,
                    horizon: staged.horizon,
                    data: staged.data,
                },
            );
            report.ephemeris_ids.push(id);
        }

        for staged in groups {
            let ephemeris_id = match staged.ephemeris {
                EphemerisRef::Stored(id) => id,
                EphemerisRef::Staged(index) => {
                    report.ephemeris_ids.get(index).copied().ok_or_else(|| {
                        RepositoryError::internal("staged ephemeris vanished during commit")
                    })?
                }
            };
            let group_id = EligibilityGroupId(data.next_group_id);
            data.next_group_id += 1;

            let mut interval_ids = Vec::with_capacity(staged.intervals.len());
            for window in staged.intervals {
                let iid = EligibilityId(data.next_eligibility_id);
                data.next_eligibility_id += 1;
                data.intervals.insert(
                    iid,
                    IntervalRecord {
                        group_id,
                        start: window.start,
                        end: window.end,
                    },
                );
                interval_ids.push(iid);
            }

            data.groups.insert(
                group_id,
                GroupRecord {
                    ephemeris_id,
                    station_id: staged.station_id,
                    mask: staged.mask,
                    step_ms: staged.step_ms,
                    backend: staged.backend,
                    interval_ids,
                },
            );
            report.group_ids.push(group_id);
        }

        Ok(report)
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, LocalData>> {
        self.data
            .read()
            .map_err(|_| RepositoryError::internal("local repository lock poisoned"))
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, LocalData>> {
        self.data
            .write()
            .map_err(|_| RepositoryError::internal("local repository lock poisoned"))
    }

    /// Helper to check health and return error if unhealthy.
    fn check_health(&self) -> RepositoryResult<()> {
        if !self.read()?.is_healthy {
            return Err(RepositoryError::connection("Database is not healthy"));
        }
        Ok(())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocate the id for a newly stored registry entity. An explicit id is
/// kept as long as it is free, and the counter skips past it.
fn allocate_id(
    taken: impl Fn(i64) -> bool,
    next: &mut i64,
    requested: Option<i64>,
    entity: &str,
) -> RepositoryResult<i64> {
    match requested {
        Some(id) if taken(id) => Err(RepositoryError::unique_violation(
            format!("{} {} already exists", entity, id),
            ErrorContext::new("store").with_entity(entity).with_entity_id(id),
        )),
        Some(id) => {
            *next = (*next).max(id + 1);
            Ok(id)
        }
        None => {
            let id = *next;
            *next += 1;
            Ok(id)
        }
    }
}

#[async_trait]
impl TransactionRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.read()?.is_healthy)
    }

    async fn commit(&self, unit: UnitOfWork) -> RepositoryResult<CommitReport> {
        self.commit_impl(unit)
    }
}

#[async_trait]
impl EphemerisRepository for LocalRepository {
    async fn extract_ephemeris(
        &self,
        satellite_id: SatelliteId,
        horizon: &TimeHorizon,
        shrink: bool,
    ) -> RepositoryResult<Option<Ephemeris>> {
        self.check_health()?;
        let record = {
            let data = self.read()?;
            coverage::select_covering(
                data.ephemerides
                    .values()
                    .filter(|e| e.satellite_id == satellite_id),
                horizon,
            )
            .cloned()
        };

        match record {
            Some(record) => coverage::materialize_ephemeris(&record, horizon, shrink).map(Some),
            None => Ok(None),
        }
    }

    async fn load_ephemeris(&self, id: EphemerisId) -> RepositoryResult<Ephemeris> {
        self.check_health()?;
        let record = self.read()?.ephemerides.get(&id).cloned().ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Ephemeris {} not found", id),
                ErrorContext::new("load_ephemeris")
                    .with_entity("ephemeris")
                    .with_entity_id(id),
            )
        })?;
        coverage::materialize_ephemeris(&record, &record.horizon, false)
    }

    async fn list_horizons(&self, satellite_id: SatelliteId) -> RepositoryResult<Vec<TimeHorizon>> {
        self.check_health()?;
        let data = self.read()?;
        let mut horizons: Vec<TimeHorizon> = data
            .ephemerides
            .values()
            .filter(|e| e.satellite_id == satellite_id)
            .map(|e| e.horizon)
            .collect();
        horizons.sort_by_key(|h| (h.start(), h.end(), h.step()));
        horizons.dedup();
        Ok(horizons)
    }
}

#[async_trait]
impl EligibilityRepository for LocalRepository {
    async fn extract_eligibilities(
        &self,
        query: &EligibilityQuery,
    ) -> RepositoryResult<EligibilityLookup> {
        self.check_health()?;
        let data = self.read()?;
        let satellites: HashSet<SatelliteId> = query.satellites.iter().copied().collect();
        let step_ms = query.interpolation_step_ms();

        let mut lookup: EligibilityLookup = query.pairs().map(|pair| (pair, None)).collect();

        for group in data.groups.values() {
            let Some(ephemeris) = data.ephemerides.get(&group.ephemeris_id) else {
                continue;
            };
            if !satellites.contains(&ephemeris.satellite_id)
                || !ephemeris.horizon.covers(&query.horizon)
                || group.step_ms != step_ms
                || group.backend != query.backend
                || query.station_masks.get(&group.station_id) != Some(&group.mask)
            {
                continue;
            }

            // Groups iterate in id order, so the first match per pair wins.
            let slot = lookup
                .entry((ephemeris.satellite_id, group.station_id))
                .or_insert(None);
            if slot.is_none() {
                *slot = Some(coverage::select_intervals(
                    ephemeris.satellite_id,
                    group.station_id,
                    &data.stored_intervals(group),
                    &query.horizon,
                    query.shrink,
                ));
            }
        }

        Ok(lookup)
    }

    async fn load_group(&self, id: EligibilityGroupId) -> RepositoryResult<EligibilityGroup> {
        self.check_health()?;
        let data = self.read()?;
        data.groups
            .get(&id)
            .map(|g| data.group_to_model(id, g))
            .ok_or_else(|| {
                RepositoryError::not_found_with_context(
                    format!("Eligibility group {} not found", id),
                    ErrorContext::new("load_group")
                        .with_entity("eligibility_group")
                        .with_entity_id(id),
                )
            })
    }

    async fn list_groups(&self, satellite_id: SatelliteId) -> RepositoryResult<Vec<EligibilityGroup>> {
        self.check_health()?;
        let data = self.read()?;
        Ok(data
            .groups
            .iter()
            .filter(|(_, g)| {
                data.ephemerides
                    .get(&g.ephemeris_id)
                    .is_some_and(|e| e.satellite_id == satellite_id)
            })
            .map(|(id, g)| data.group_to_model(*id, g))
            .collect())
    }
}

#[async_trait]
impl EntityRegistry<Satellite> for LocalRepository {
    async fn load(&self, id: SatelliteId) -> RepositoryResult<Option<Satellite>> {
        self.check_health()?;
        Ok(self.read()?.satellites.get(&id).cloned())
    }

    async fn store(&self, entity: &Satellite) -> RepositoryResult<Satellite> {
        self.check_health()?;
        let mut guard = self.write()?;
        let data = &mut *guard;
        let existing = &data.satellites;
        let id = SatelliteId(allocate_id(
            |id| existing.contains_key(&SatelliteId(id)),
            &mut data.next_satellite_id,
            entity.id.map(|i| i.0),
            "satellite",
        )?);
        let stored = Satellite {
            id: Some(id),
            ..entity.clone()
        };
        data.satellites.insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: SatelliteId) -> RepositoryResult<bool> {
        self.check_health()?;
        let mut data = self.write()?;
        if data.satellites.remove(&id).is_none() {
            return Ok(false);
        }
        let doomed: HashSet<EphemerisId> = data
            .ephemerides
            .values()
            .filter(|e| e.satellite_id == id)
            .map(|e| e.id)
            .collect();
        data.remove_ephemerides(&doomed);
        Ok(true)
    }

    async fn list(&self, offset: usize, limit: usize) -> RepositoryResult<Vec<Satellite>> {
        self.check_health()?;
        Ok(self
            .read()?
            .satellites
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EntityRegistry<Station> for LocalRepository {
    async fn load(&self, id: StationId) -> RepositoryResult<Option<Station>> {
        self.check_health()?;
        Ok(self.read()?.stations.get(&id).cloned())
    }

    async fn store(&self, entity: &Station) -> RepositoryResult<Station> {
        self.check_health()?;
        let mut guard = self.write()?;
        let data = &mut *guard;
        let existing = &data.stations;
        let id = StationId(allocate_id(
            |id| existing.contains_key(&StationId(id)),
            &mut data.next_station_id,
            entity.id.map(|i| i.0),
            "station",
        )?);
        let stored = Station {
            id: Some(id),
            ..entity.clone()
        };
        data.stations.insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: StationId) -> RepositoryResult<bool> {
        self.check_health()?;
        let mut data = self.write()?;
        if data.stations.remove(&id).is_none() {
            return Ok(false);
        }
        let doomed: Vec<EligibilityGroupId> = data
            .groups
            .iter()
            .filter(|(_, g)| g.station_id == id)
            .map(|(gid, _)| *gid)
            .collect();
        data.remove_groups(&doomed);
        Ok(true)
    }

    async fn list(&self, offset: usize, limit: usize) -> RepositoryResult<Vec<Station>> {
        self.check_health()?;
        Ok(self
            .read()?
            .stations
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

impl LocalData {
    fn eligibility_to_model(&self, id: EligibilityId, iv: &IntervalRecord) -> Option<Eligibility> {
        let group = self.groups.get(&iv.group_id)?;
        let ephemeris = self.ephemerides.get(&group.ephemeris_id)?;
        Some(Eligibility {
            id: Some(id),
            satellite_id: ephemeris.satellite_id,
            station_id: group.station_id,
            start: iv.start,
            end: iv.end,
        })
    }
}

#[async_trait]
impl EntityRegistry<Eligibility> for LocalRepository {
    async fn load(&self, id: EligibilityId) -> RepositoryResult<Option<Eligibility>> {
        self.check_health()?;
        let data = self.read()?;
        Ok(data
            .intervals
            .get(&id)
            .and_then(|iv| data.eligibility_to_model(id, iv)))
    }

    async fn store(&self, _entity: &Eligibility) -> RepositoryResult<Eligibility> {
        Err(RepositoryError::unsupported(
            "eligibilities cannot be stored individually, stage a group instead",
            ErrorContext::new("store").with_entity("eligibility"),
        ))
    }

    async fn delete(&self, id: EligibilityId) -> RepositoryResult<bool> {
        self.check_health()?;
        let mut data = self.write()?;
        let Some(iv) = data.intervals.remove(&id) else {
            return Ok(false);
        };
        if let Some(group) = data.groups.get_mut(&iv.group_id) {
            group.interval_ids.retain(|iid| *iid != id);
        }
        Ok(true)
    }

    async fn list(&self, offset: usize, limit: usize) -> RepositoryResult<Vec<Eligibility>> {
        self.check_health()?;
        let data = self.read()?;
        Ok(data
            .intervals
            .iter()
            .filter_map(|(id, iv)| data.eligibility_to_model(*id, iv))
            .skip(offset)
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::mask;
    use crate::models::{ElevationMask, GroundLocation, SatelliteOrbit, StateSample};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn horizon(start_s: i64, end_s: i64, step_s: i64) -> TimeHorizon {
        TimeHorizon::new(
            t0() + Duration::seconds(start_s),
            t0() + Duration::seconds(end_s),
            Duration::seconds(step_s),
        )
        .unwrap()
    }

    fn satellite() -> Satellite {
        Satellite::new(
            "sat",
            SatelliteOrbit {
                epoch: t0(),
                semi_major_axis: 7000.0,
                eccentricity: 0.0,
                inclination: 53.0,
                argument_of_perigee: 0.0,
                raan: 0.0,
                true_anomaly: 0.0,
            },
        )
    }

    fn station() -> Station {
        Station::new(
            "Toulouse",
            "France",
            GroundLocation {
                latitude: 43.6,
                longitude: 1.44,
                altitude: 0.15,
            },
        )
    }

    fn ephemeris(satellite_id: SatelliteId, h: TimeHorizon) -> Ephemeris {
        let samples = (0..h.sample_count())
            .map(|i| StateSample::new([i as f64, 0.0, 0.0], [0.0; 3]))
            .collect();
        Ephemeris::new(satellite_id, h, samples)
    }

    async fn seeded() -> (LocalRepository, SatelliteId, StationId) {
        let repo = LocalRepository::new();
        let sat = repo.store(&satellite()).await.unwrap().id.unwrap();
        let st = repo.store(&station()).await.unwrap().id.unwrap();
        (repo, sat, st)
    }

    #[tokio::test]
    async fn test_health_check() {
        let repo = LocalRepository::new();
        assert!(repo.health_check().await.unwrap());

        repo.set_healthy(false);
        assert!(!repo.health_check().await.unwrap());
        assert!(matches!(
            repo.extract_ephemeris(SatelliteId(1), &horizon(0, 60, 30), true)
                .await,
            Err(RepositoryError::ConnectionError { .. })
        ));
    }

    #[tokio::test]
    async fn test_commit_then_extract() {
        let (repo, sat, _) = seeded().await;
        let mut unit = UnitOfWork::new();
        unit.stage_ephemeris(&ephemeris(sat, horizon(0, 7200, 30)))
            .unwrap();
        let report = repo.commit(unit).await.unwrap();
        assert_eq!(report.ephemeris_ids, vec![EphemerisId(1)]);

        let hit = repo
            .extract_ephemeris(sat, &horizon(1800, 3600, 30), true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.samples.len(), 61);
        assert_eq!(hit.samples[0].x, 60.0);

        assert!(repo
            .extract_ephemeris(sat, &horizon(1800, 3600, 60), true)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_ephemeris_is_rejected_atomically() {
        let (repo, sat, st) = seeded().await;
        let mut first = UnitOfWork::new();
        first
            .stage_ephemeris(&ephemeris(sat, horizon(0, 60, 30)))
            .unwrap();
        repo.commit(first).await.unwrap();

        let mut second = UnitOfWork::new();
        let other = second
            .stage_ephemeris(&ephemeris(sat, horizon(0, 120, 30)))
            .unwrap();
        second
            .create_group(
                other,
                st,
                vec![],
                mask::encode(&ElevationMask::constant(5.0)),
                Duration::seconds(10),
                "elevation",
            )
            .unwrap();
        second
            .stage_ephemeris(&ephemeris(sat, horizon(0, 60, 30)))
            .unwrap();

        let err = repo.commit(second).await.unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(repo.ephemeris_count(), 1);
        assert_eq!(repo.group_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_requires_registered_satellite() {
        let repo = LocalRepository::new();
        let mut unit = UnitOfWork::new();
        unit.stage_ephemeris(&ephemeris(SatelliteId(9), horizon(0, 60, 30)))
            .unwrap();
        assert!(matches!(
            repo.commit(unit).await,
            Err(RepositoryError::ValidationError { .. })
        ));
    }

    #[tokio::test]
    async fn test_store_or_load_returns_persisted_copy() {
        let repo = LocalRepository::new();
        let stored = repo.store(&satellite()).await.unwrap();

        let mut renamed = stored.clone();
        renamed.name = "other".to_string();
        let loaded = repo.store_or_load(&renamed).await.unwrap();
        assert_eq!(loaded.name, "sat");
        assert_eq!(EntityRegistry::<Satellite>::list(&repo, 0, 10).await.unwrap().len(), 1);

        let mut unknown = satellite();
        unknown.id = Some(SatelliteId(40));
        let created = repo.store_or_load(&unknown).await.unwrap();
        assert_eq!(created.id, Some(SatelliteId(40)));
        let next = repo.store(&satellite()).await.unwrap();
        assert_eq!(next.id, Some(SatelliteId(41)));
    }

    #[tokio::test]
    async fn test_store_with_taken_id_is_unique_violation() {
        let (repo, _, st) = seeded().await;
        let mut dup = station();
        dup.id = Some(st);
        let err = repo.store(&dup).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_eligibility_cannot_be_stored_alone() {
        let repo = LocalRepository::new();
        let e = Eligibility {
            id: None,
            satellite_id: SatelliteId(1),
            station_id: StationId(1),
            start: t0(),
            end: t0() + Duration::seconds(10),
        };
        assert!(matches!(
            repo.store(&e).await,
            Err(RepositoryError::UnsupportedOperation { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (repo, sat, st) = seeded().await;
        let key = mask::encode(&ElevationMask::constant(5.0));
        let mut unit = UnitOfWork::new();
        let eph = unit
            .stage_ephemeris(&ephemeris(sat, horizon(0, 60, 30)))
            .unwrap();
        unit.create_group(
            eph,
            st,
            vec![VisibilityWindow::new(t0(), t0() + Duration::seconds(20))],
            key,
            Duration::seconds(10),
            "elevation",
        )
        .unwrap();
        let report = repo.commit(unit).await.unwrap();
        let iid = repo.list_groups(sat).await.unwrap()[0].id;
        assert_eq!(iid, report.group_ids[0]);
        assert_eq!(repo.interval_count(), 1);

        assert!(EntityRegistry::<Station>::delete(&repo, st).await.unwrap());
        assert_eq!(repo.group_count(), 0);
        assert_eq!(repo.interval_count(), 0);
        assert_eq!(repo.ephemeris_count(), 1);

        assert!(EntityRegistry::<Satellite>::delete(&repo, sat).await.unwrap());
        assert_eq!(repo.ephemeris_count(), 0);
        assert!(!EntityRegistry::<Satellite>::delete(&repo, sat).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_horizons_sorted_and_distinct() {
        let (repo, sat, _) = seeded().await;
        let mut unit = UnitOfWork::new();
        unit.stage_ephemeris(&ephemeris(sat, horizon(600, 1200, 30)))
            .unwrap();
        unit.stage_ephemeris(&ephemeris(sat, horizon(0, 600, 60)))
            .unwrap();
        repo.commit(unit).await.unwrap();

        let horizons = repo.list_horizons(sat).await.unwrap();
        assert_eq!(horizons, vec![horizon(0, 600, 60), horizon(600, 1200, 30)]);
        assert!(repo.list_horizons(SatelliteId(99)).await.unwrap().is_empty());
    }
}
