use std::hint::black_box;

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use smartlink_rust::codec::timeseries;
use smartlink_rust::compute::{
    EarthRotation, EligibilityComputation, ElevationVisibility, FrameConversion,
    InterpolationMethod, InterpolationSettings, KeplerPropagator, Propagator,
};
use smartlink_rust::db::coverage::{materialize_ephemeris, StoredEphemeris};
use smartlink_rust::models::{
    ElevationMask, Ephemeris, EphemerisId, GroundLocation, Satellite, SatelliteId,
    SatelliteOrbit, StateSample, TimeHorizon,
};

fn day_horizon(step_s: i64) -> TimeHorizon {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    TimeHorizon::new(start, start + Duration::days(1), Duration::seconds(step_s)).unwrap()
}

fn samples(count: usize) -> Vec<StateSample> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            StateSample::new([t, t * 0.5, -t], [1.0, 0.0, 0.5])
        })
        .collect()
}

fn bench_timeseries_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeseries_codec");

    for step_s in [60i64, 10, 1] {
        let count = day_horizon(step_s).sample_count();
        let rows = samples(count);
        let blob = timeseries::encode(&rows);

        group.bench_with_input(BenchmarkId::new("encode", count), &rows, |b, rows| {
            b.iter(|| timeseries::encode(black_box(rows)));
        });
        group.bench_with_input(BenchmarkId::new("decode", count), &blob, |b, blob| {
            b.iter(|| timeseries::decode(black_box(blob), count).unwrap());
        });
    }

    group.finish();
}

fn bench_shrink(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_ephemeris");

    let stored = day_horizon(10);
    let record = StoredEphemeris {
        id: EphemerisId(1),
        satellite_id: SatelliteId(1),
        horizon: stored,
        data: timeseries::encode(&samples(stored.sample_count())),
    };
    let hour = TimeHorizon::new(
        stored.start() + Duration::hours(6),
        stored.start() + Duration::hours(7),
        stored.step(),
    )
    .unwrap();

    group.bench_function("shrink_one_hour", |b| {
        b.iter(|| materialize_ephemeris(black_box(&record), black_box(&hour), true).unwrap());
    });
    group.bench_function("whole_day", |b| {
        b.iter(|| materialize_ephemeris(black_box(&record), black_box(&hour), false).unwrap());
    });

    group.finish();
}

fn bench_visibility(c: &mut Criterion) {
    let mut group = c.benchmark_group("visibility");

    let horizon = day_horizon(60);
    let satellite = Satellite {
        id: Some(SatelliteId(1)),
        name: "bench".to_string(),
        orbit: SatelliteOrbit {
            epoch: horizon.start(),
            semi_major_axis: 6878.0,
            eccentricity: 0.001,
            inclination: 53.0,
            argument_of_perigee: 0.0,
            raan: 0.0,
            true_anomaly: 0.0,
        },
    };
    let inertial = KeplerPropagator::default()
        .propagate(&satellite, &horizon)
        .unwrap();
    let fixed = EarthRotation.inertial_to_fixed(&horizon, &inertial).unwrap();
    let ephemeris = Ephemeris::new(SatelliteId(1), horizon, fixed);
    let station = GroundLocation {
        latitude: 43.6,
        longitude: 1.44,
        altitude: 0.15,
    };
    let mask = ElevationMask::constant(10.0);

    group.bench_function("propagate_day", |b| {
        b.iter(|| {
            KeplerPropagator::default()
                .propagate(black_box(&satellite), &horizon)
                .unwrap()
        });
    });

    for method in [InterpolationMethod::Linear, InterpolationMethod::Cubic] {
        let settings = InterpolationSettings {
            step: Duration::seconds(10),
            method,
        };
        group.bench_with_input(
            BenchmarkId::new("windows_day_10s", method),
            &settings,
            |b, settings| {
                b.iter(|| {
                    ElevationVisibility
                        .compute(black_box(&ephemeris), &station, &mask, settings)
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_timeseries_codec, bench_shrink, bench_visibility);
criterion_main!(benches);
