//! Cache semantics of the in-memory repository through the trait objects
//! the services use.

mod support;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use smartlink_rust::codec::mask;
use smartlink_rust::db::services::{load_entity, require_entity};
use smartlink_rust::db::{
    EligibilityQuery, EligibilityRepository, EphemerisRef, EphemerisRepository, FullRepository,
    LocalRepository, RepositoryError, TransactionRepository, UnitOfWork,
};
use smartlink_rust::models::{
    EligibilityId, Ephemeris, SatelliteId, StateSample, Station, StationId, TimeHorizon,
    VisibilityWindow,
};

use support::{flat_mask, horizon, seeded_repository, t0};

fn ramp(satellite_id: SatelliteId, h: TimeHorizon) -> Ephemeris {
    let samples = (0..h.sample_count())
        .map(|i| StateSample::new([i as f64, 0.0, 0.0], [0.0, 1.0, 0.0]))
        .collect();
    Ephemeris::new(satellite_id, h, samples)
}

fn window(start_s: i64, end_s: i64) -> VisibilityWindow {
    VisibilityWindow::new(
        t0() + Duration::seconds(start_s),
        t0() + Duration::seconds(end_s),
    )
}

fn query(satellite: SatelliteId, station: StationId, h: TimeHorizon, shrink: bool) -> EligibilityQuery {
    EligibilityQuery {
        satellites: vec![satellite],
        station_masks: BTreeMap::from([(station, mask::encode(&flat_mask(10.0)))]),
        horizon: h,
        interpolation_step: Duration::seconds(60),
        backend: "elevation".to_string(),
        shrink,
    }
}

fn stage_group(unit: &mut UnitOfWork, eph: EphemerisRef, station: StationId, windows: Vec<VisibilityWindow>) {
    unit.create_group(
        eph,
        station,
        windows,
        mask::encode(&flat_mask(10.0)),
        Duration::seconds(60),
        "elevation",
    )
    .unwrap();
}

#[tokio::test]
async fn test_lookup_shrinks_to_fully_contained_intervals() {
    let (local, sat, station, _) = seeded_repository().await;
    let repo: Arc<dyn FullRepository> = Arc::new(local);

    let mut unit = UnitOfWork::new();
    let eph = unit.stage_ephemeris(&ramp(sat, horizon(0, 3600, 60))).unwrap();
    stage_group(
        &mut unit,
        eph,
        station,
        vec![window(100, 400), window(900, 1300), window(2000, 2100)],
    );
    repo.commit(unit).await.unwrap();

    let shrunk = repo
        .extract_eligibilities(&query(sat, station, horizon(600, 1800, 60), true))
        .await
        .unwrap();
    let hits = shrunk[&(sat, station)].as_ref().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].start, t0() + Duration::seconds(900));
    assert_eq!(hits[0].end, t0() + Duration::seconds(1300));

    let whole = repo
        .extract_eligibilities(&query(sat, station, horizon(600, 1800, 60), false))
        .await
        .unwrap();
    assert_eq!(whole[&(sat, station)].as_ref().unwrap().len(), 3);
}

#[tokio::test]
async fn test_half_hour_window_of_two_hour_record() {
    let (local, sat, _, _) = seeded_repository().await;
    let repo: Arc<dyn FullRepository> = Arc::new(local);

    let mut unit = UnitOfWork::new();
    unit.stage_ephemeris(&ramp(sat, horizon(0, 7200, 30))).unwrap();
    repo.commit(unit).await.unwrap();

    let hit = repo
        .extract_ephemeris(sat, &horizon(1800, 3600, 30), true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.samples.len(), 61);
    assert_eq!(hit.samples[0].x, 60.0);
    assert_eq!(hit.horizon, horizon(1800, 3600, 30));

    assert!(repo
        .extract_ephemeris(sat, &horizon(1800, 3600, 60), true)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_empty_group_is_a_cached_hit() {
    let (local, sat, station, other) = seeded_repository().await;
    let repo: Arc<dyn FullRepository> = Arc::new(local);

    let mut unit = UnitOfWork::new();
    let eph = unit.stage_ephemeris(&ramp(sat, horizon(0, 600, 60))).unwrap();
    stage_group(&mut unit, eph, station, vec![]);
    repo.commit(unit).await.unwrap();

    let mut q = query(sat, station, horizon(0, 600, 60), true);
    q.station_masks.insert(other, mask::encode(&flat_mask(10.0)));
    let lookup = repo.extract_eligibilities(&q).await.unwrap();

    assert_eq!(lookup.len(), 2);
    assert_eq!(lookup[&(sat, station)], Some(vec![]));
    assert_eq!(lookup[&(sat, other)], None);
}

#[tokio::test]
async fn test_lookup_misses_on_mask_step_or_uncovered_horizon() {
    let (local, sat, station, _) = seeded_repository().await;
    let repo: Arc<dyn FullRepository> = Arc::new(local);

    let mut unit = UnitOfWork::new();
    let eph = unit.stage_ephemeris(&ramp(sat, horizon(0, 600, 60))).unwrap();
    stage_group(&mut unit, eph, station, vec![window(60, 120)]);
    repo.commit(unit).await.unwrap();

    let mut other_mask = query(sat, station, horizon(0, 600, 60), true);
    other_mask
        .station_masks
        .insert(station, mask::encode(&flat_mask(11.0)));
    let mut other_step = query(sat, station, horizon(0, 600, 60), true);
    other_step.interpolation_step = Duration::seconds(30);
    let longer = query(sat, station, horizon(0, 1200, 60), true);
    let coarser = query(sat, station, horizon(0, 600, 120), true);

    for q in [other_mask, other_step, longer, coarser] {
        let lookup = repo.extract_eligibilities(&q).await.unwrap();
        assert_eq!(lookup[&(sat, station)], None);
    }
}

#[tokio::test]
async fn test_lowest_group_id_wins() {
    let (local, sat, station, _) = seeded_repository().await;
    let repo: Arc<dyn FullRepository> = Arc::new(local);

    let mut first = UnitOfWork::new();
    let eph = first.stage_ephemeris(&ramp(sat, horizon(0, 3600, 60))).unwrap();
    stage_group(&mut first, eph, station, vec![window(60, 120)]);
    repo.commit(first).await.unwrap();

    let mut second = UnitOfWork::new();
    let eph = second.stage_ephemeris(&ramp(sat, horizon(0, 7200, 60))).unwrap();
    stage_group(&mut second, eph, station, vec![window(300, 360)]);
    repo.commit(second).await.unwrap();

    let lookup = repo
        .extract_eligibilities(&query(sat, station, horizon(0, 1800, 60), true))
        .await
        .unwrap();
    let hits = lookup[&(sat, station)].as_ref().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].start, t0() + Duration::seconds(60));
    assert_eq!(hits[0].id, Some(EligibilityId(1)));
}

#[tokio::test]
async fn test_concurrent_commits_store_one_record() {
    use tokio::task::JoinSet;

    let (local, sat, _, _) = seeded_repository().await;
    let repo: Arc<dyn FullRepository> = Arc::new(local.clone());

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let repo = repo.clone();
        tasks.spawn(async move {
            let mut unit = UnitOfWork::new();
            unit.stage_ephemeris(&ramp(sat, horizon(0, 600, 60))).unwrap();
            repo.commit(unit).await
        });
    }

    let mut stored = 0;
    let mut lost = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => stored += 1,
            Err(e) if e.is_unique_violation() => lost += 1,
            Err(e) => panic!("unexpected commit failure: {}", e),
        }
    }

    assert_eq!(stored, 1);
    assert_eq!(lost, 7);
    assert_eq!(local.ephemeris_count(), 1);
}

#[tokio::test]
async fn test_corrupt_blob_is_reported() {
    let (local, sat, _, _) = seeded_repository().await;

    let mut unit = UnitOfWork::new();
    unit.stage_ephemeris(&ramp(sat, horizon(0, 600, 60))).unwrap();
    let report = local.commit_impl(unit).unwrap();
    local
        .replace_ephemeris_data(report.ephemeris_ids[0], vec![0u8; 13])
        .unwrap();

    let repo: Arc<dyn FullRepository> = Arc::new(local);
    let err = repo
        .extract_ephemeris(sat, &horizon(0, 300, 60), true)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::CorruptData { .. }));
}

#[tokio::test]
async fn test_registry_lookup_by_id_type() {
    let (local, sat, station, _) = seeded_repository().await;
    let repo: Arc<dyn FullRepository> = Arc::new(local);

    let satellite = load_entity(repo.as_ref(), sat).await.unwrap().unwrap();
    assert_eq!(satellite.name, "EQ-1");
    let quito: Station = require_entity(repo.as_ref(), station).await.unwrap();
    assert_eq!(quito.city, "Quito");

    assert!(load_entity(repo.as_ref(), StationId(404))
        .await
        .unwrap()
        .is_none());
    assert!(matches!(
        require_entity(repo.as_ref(), SatelliteId(404)).await,
        Err(RepositoryError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_unhealthy_repository_refuses_commits() {
    let local = LocalRepository::new();
    local.set_healthy(false);
    let repo: Arc<dyn FullRepository> = Arc::new(local);

    assert!(!repo.health_check().await.unwrap());
    let err = repo.commit(UnitOfWork::new()).await.unwrap_err();
    assert!(matches!(err, RepositoryError::ConnectionError { .. }));
}
