//! Property tests for horizon coverage and cache keys.

mod support;

use chrono::Duration;
use proptest::prelude::*;
use smartlink_rust::codec::{mask, timeseries};
use smartlink_rust::db::coverage::{
    materialize_ephemeris, select_covering, select_intervals, StoredEphemeris, StoredInterval,
};
use smartlink_rust::models::{
    EligibilityId, ElevationMask, EphemerisId, SatelliteId, StateSample, StationId, TimeHorizon,
};

use support::{horizon, t0};

fn samples(count: usize) -> Vec<StateSample> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            StateSample::new([t, 2.0 * t, -t], [0.5, t.sin(), t.cos()])
        })
        .collect()
}

/// A stored record plus an aligned sub-horizon inside it.
fn record_and_window() -> impl Strategy<Value = (StoredEphemeris, TimeHorizon, usize)> {
    (1i64..=120, 2usize..=200)
        .prop_flat_map(|(step_s, steps)| {
            (
                Just(step_s),
                Just(steps),
                0..steps,
            )
        })
        .prop_flat_map(|(step_s, steps, first)| {
            (Just(step_s), Just(steps), Just(first), (first + 1)..=steps)
        })
        .prop_map(|(step_s, steps, first, last)| {
            let record = stored_record(horizon(0, step_s * steps as i64, step_s));
            let window = horizon(step_s * first as i64, step_s * last as i64, step_s);
            (record, window, first)
        })
}

fn stored_record(h: TimeHorizon) -> StoredEphemeris {
    StoredEphemeris {
        id: EphemerisId(1),
        satellite_id: SatelliteId(1),
        horizon: h,
        data: timeseries::encode(&samples(h.sample_count())),
    }
}

proptest! {
    #[test]
    fn prop_hit_iff_same_step_and_contained(
        (stored_start, stored_len, stored_step) in (0i64..3600, 1i64..7200, 1i64..=120),
        (start, len, step) in (-600i64..7200, 1i64..7200, 1i64..=120),
    ) {
        let stored = horizon(stored_start, stored_start + stored_len, stored_step);
        let requested = horizon(start, start + len, step);
        let record = stored_record(stored);

        let expected = step == stored_step
            && start >= stored_start
            && start + len <= stored_start + stored_len;
        prop_assert_eq!(stored.covers(&requested), expected);
        prop_assert_eq!(select_covering([&record], &requested).is_some(), expected);
    }

    #[test]
    fn prop_no_hit_for_other_step_or_protruding_window(
        (record, window, _) in record_and_window(),
        extra_step in 1i64..=60,
        overhang in 1i64..=600,
    ) {
        let step_s = window.step().num_seconds();
        let start_s = (window.start() - t0()).num_seconds();
        let end_s = (window.end() - t0()).num_seconds();
        let stored_end_s = (record.horizon.end() - t0()).num_seconds();

        let other_step = horizon(start_s, end_s, step_s + extra_step);
        let early = horizon(start_s - overhang, end_s, step_s);
        let late = horizon(start_s, stored_end_s + overhang, step_s);

        for requested in [other_step, early, late] {
            prop_assert!(!record.horizon.covers(&requested));
            prop_assert!(select_covering([&record], &requested).is_none());
        }
    }

    #[test]
    fn prop_shrunk_window_matches_stored_rows((record, window, first) in record_and_window()) {
        prop_assert!(record.horizon.covers(&window));

        let shrunk = materialize_ephemeris(&record, &window, true).unwrap();
        let all = samples(record.horizon.sample_count());

        prop_assert_eq!(shrunk.horizon, window);
        prop_assert_eq!(shrunk.id, Some(record.id));
        prop_assert_eq!(shrunk.samples.len(), window.sample_count());
        prop_assert_eq!(&shrunk.samples[..], &all[first..first + window.sample_count()]);
    }

    #[test]
    fn prop_unshrunk_extraction_returns_whole_record((record, window, _) in record_and_window()) {
        let whole = materialize_ephemeris(&record, &window, false).unwrap();
        prop_assert_eq!(whole.horizon, record.horizon);
        prop_assert_eq!(whole.samples.len(), record.horizon.sample_count());
    }

    #[test]
    fn prop_shrunk_intervals_lie_inside_horizon(
        bounds in prop::collection::vec((0i64..7200, 1i64..900), 0..20),
        start in 0i64..3600,
        len in 60i64..3600,
    ) {
        let window = horizon(start, start + len, 60);
        let intervals: Vec<StoredInterval> = bounds
            .iter()
            .enumerate()
            .map(|(i, (s, d))| StoredInterval {
                id: EligibilityId(i as i64 + 1),
                start: t0() + Duration::seconds(*s),
                end: t0() + Duration::seconds(s + d),
            })
            .collect();

        let kept = select_intervals(SatelliteId(1), StationId(1), &intervals, &window, true);
        let inside = intervals
            .iter()
            .filter(|iv| iv.start >= window.start() && iv.end <= window.end())
            .count();

        prop_assert_eq!(kept.len(), inside);
        for e in &kept {
            prop_assert!(window.contains(e.start) && window.contains(e.end));
            let original = intervals.iter().find(|iv| Some(iv.id) == e.id).unwrap();
            prop_assert_eq!((original.start, original.end), (e.start, e.end));
        }

        let all = select_intervals(SatelliteId(1), StationId(1), &intervals, &window, false);
        prop_assert_eq!(all.len(), intervals.len());
    }

    #[test]
    fn prop_mask_key_is_deterministic(
        thresholds in prop::collection::vec((0.0f64..360.0, -5.0f64..90.0), 1..12),
    ) {
        let (azimuths, elevations): (Vec<f64>, Vec<f64>) = thresholds.into_iter().unzip();
        let a = ElevationMask::new(azimuths.clone(), elevations.clone()).unwrap();
        let b = ElevationMask::new(azimuths, elevations).unwrap();

        let key = mask::encode(&a);
        prop_assert_eq!(&key, &mask::encode(&b));
        prop_assert_eq!(mask::decode(&key).unwrap(), a);
    }

    #[test]
    fn prop_constant_masks_key_by_elevation(e1 in -10.0f64..90.0, e2 in -10.0f64..90.0) {
        let k1 = mask::encode(&ElevationMask::constant(e1));
        let k2 = mask::encode(&ElevationMask::constant(e2));
        prop_assert_eq!(k1 == k2, e1.to_bits() == e2.to_bits());
    }
}
