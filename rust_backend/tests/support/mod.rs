#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use smartlink_rust::compute::{
    ComputeError, EarthRotation, EligibilityComputation, ElevationVisibility, FrameConversion,
    InterpolationSettings, KeplerPropagator, Propagator, VisibilityBackends,
};
use smartlink_rust::db::repository::EntityRegistry;
use smartlink_rust::db::{ComputeSettings, LocalRepository, UnitOfWork};
use smartlink_rust::models::{
    ElevationMask, Ephemeris, GroundLocation, Satellite, SatelliteId, SatelliteOrbit, StateSample,
    Station, StationId, TimeHorizon, VisibilityWindow,
};
use smartlink_rust::services::BatchComputeOrchestrator;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// Restores the previous values on unwind and serializes access to the
/// process environment across tests.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

// =========================================================
// Fixtures
// =========================================================

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

/// Horizon in seconds relative to [`t0`].
pub fn horizon(start_s: i64, end_s: i64, step_s: i64) -> TimeHorizon {
    TimeHorizon::new(
        t0() + Duration::seconds(start_s),
        t0() + Duration::seconds(end_s),
        Duration::seconds(step_s),
    )
    .unwrap()
}

/// Three hours sampled every minute. Long enough for the equatorial orbit
/// below to complete at least one full pass over an equatorial station.
pub fn three_hours() -> TimeHorizon {
    horizon(0, 3 * 3600, 60)
}

/// Circular equatorial orbit 500 km up, epoch at [`t0`].
pub fn equatorial_satellite(name: &str) -> Satellite {
    Satellite::new(
        name,
        SatelliteOrbit {
            epoch: t0(),
            semi_major_axis: 6878.0,
            eccentricity: 0.0,
            inclination: 0.0,
            argument_of_perigee: 0.0,
            raan: 0.0,
            true_anomaly: 0.0,
        },
    )
}

pub fn equatorial_station(city: &str, longitude: f64) -> Station {
    Station::new(
        city,
        "Test",
        GroundLocation {
            latitude: 0.0,
            longitude,
            altitude: 0.0,
        },
    )
}

/// Repository with one equatorial satellite and two equatorial stations.
pub async fn seeded_repository() -> (LocalRepository, SatelliteId, StationId, StationId) {
    let repo = LocalRepository::new();
    let satellite = repo
        .store(&equatorial_satellite("EQ-1"))
        .await
        .unwrap()
        .id
        .unwrap();
    let quito = repo
        .store(&equatorial_station("Quito", -78.5))
        .await
        .unwrap()
        .id
        .unwrap();
    let libreville = repo
        .store(&equatorial_station("Libreville", 9.45))
        .await
        .unwrap()
        .id
        .unwrap();
    (repo, satellite, quito, libreville)
}

pub fn flat_mask(elevation: f64) -> ElevationMask {
    ElevationMask::constant(elevation)
}

/// Interval bounds, ignoring ids.
pub fn bounds<'a>(
    intervals: impl IntoIterator<Item = &'a smartlink_rust::models::Eligibility>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    intervals.into_iter().map(|e| (e.start, e.end)).collect()
}

// =========================================================
// Instrumented capabilities
// =========================================================

/// Kepler propagation counting its invocations.
#[derive(Default)]
pub struct CountingPropagator {
    inner: KeplerPropagator,
    pub calls: AtomicUsize,
}

impl CountingPropagator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Propagator for CountingPropagator {
    fn propagate(
        &self,
        satellite: &Satellite,
        horizon: &TimeHorizon,
    ) -> Result<Vec<StateSample>, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.propagate(satellite, horizon)
    }
}

/// Elevation visibility counting its invocations.
#[derive(Default)]
pub struct CountingVisibility {
    inner: ElevationVisibility,
    pub calls: AtomicUsize,
}

impl CountingVisibility {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EligibilityComputation for CountingVisibility {
    fn compute(
        &self,
        ephemeris: &Ephemeris,
        location: &GroundLocation,
        mask: &ElevationMask,
        settings: &InterpolationSettings,
    ) -> Result<Vec<VisibilityWindow>, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.compute(ephemeris, location, mask, settings)
    }
}

/// Propagator that, on its first call, lets a concurrent writer store the
/// same ephemeris before returning.
pub struct RacingPropagator {
    repo: LocalRepository,
    raced: AtomicBool,
    pub calls: AtomicUsize,
}

impl RacingPropagator {
    pub fn new(repo: LocalRepository) -> Self {
        Self {
            repo,
            raced: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Propagator for RacingPropagator {
    fn propagate(
        &self,
        satellite: &Satellite,
        horizon: &TimeHorizon,
    ) -> Result<Vec<StateSample>, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let inertial = KeplerPropagator::default().propagate(satellite, horizon)?;

        if !self.raced.swap(true, Ordering::SeqCst) {
            let fixed = EarthRotation.inertial_to_fixed(horizon, &inertial)?;
            let satellite_id = satellite.id.expect("racing satellite is registered");
            let mut unit = UnitOfWork::new();
            unit.stage_ephemeris(&Ephemeris::new(satellite_id, *horizon, fixed))
                .expect("competing ephemeris stages");
            self.repo
                .commit_impl(unit)
                .expect("competing writer commits first");
        }

        Ok(inertial)
    }
}

/// Orchestrator over the reference frames with the given propagator and an
/// `elevation` backend.
pub fn orchestrator(
    propagator: Arc<dyn Propagator>,
    visibility: Arc<dyn EligibilityComputation>,
    settings: ComputeSettings,
) -> BatchComputeOrchestrator {
    BatchComputeOrchestrator::new(
        propagator,
        Arc::new(EarthRotation),
        VisibilityBackends::empty().register("elevation", visibility),
        settings,
    )
}
