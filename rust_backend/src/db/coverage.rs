//! Horizon coverage rules shared by every repository backend.
//!
//! Backends only locate candidate rows; deciding whether a row can serve a
//! request and carving the requested window out of it happens here so that
//! all backends answer identically.

use chrono::{DateTime, Utc};

use super::repository::{ErrorContext, RepositoryError, RepositoryResult};
use crate::codec::timeseries;
use crate::models::{
    Eligibility, EligibilityId, Ephemeris, EphemerisId, SatelliteId, StationId, TimeHorizon,
};

/// Ephemeris row as persisted: covering horizon plus the encoded blob.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEphemeris {
    pub id: EphemerisId,
    pub satellite_id: SatelliteId,
    pub horizon: TimeHorizon,
    pub data: Vec<u8>,
}

/// Interval row as persisted inside an eligibility group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredInterval {
    pub id: EligibilityId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Pick the record that serves `requested`: same step, covering range, and
/// the lowest id among several candidates.
pub fn select_covering<'a, I>(candidates: I, requested: &TimeHorizon) -> Option<&'a StoredEphemeris>
where
    I: IntoIterator<Item = &'a StoredEphemeris>,
{
    candidates
        .into_iter()
        .filter(|record| record.horizon.covers(requested))
        .min_by_key(|record| record.id)
}

/// Turn a covering record into the ephemeris returned to callers.
///
/// With `shrink`, only the samples inside `requested` are decoded and the
/// result is relabeled with `requested`; the record id is kept. Without it
/// the whole record comes back under its own horizon.
pub fn materialize_ephemeris(
    record: &StoredEphemeris,
    requested: &TimeHorizon,
    shrink: bool,
) -> RepositoryResult<Ephemeris> {
    let stored_count = record.horizon.sample_count();
    let context = || {
        ErrorContext::new("extract_ephemeris")
            .with_entity("ephemeris")
            .with_entity_id(record.id)
    };

    if !shrink {
        let samples = timeseries::decode(&record.data, stored_count)
            .map_err(|e| RepositoryError::corrupt(e.to_string(), context()))?;
        return Ok(Ephemeris {
            id: Some(record.id),
            satellite_id: record.satellite_id,
            horizon: record.horizon,
            samples,
        });
    }

    let offset = record
        .horizon
        .sample_index(requested.start())
        .ok_or_else(|| {
            RepositoryError::misaligned(
                format!(
                    "requested start {} is not on the {}ms grid of record starting {}",
                    requested.start().to_rfc3339(),
                    record.horizon.step_ms(),
                    record.horizon.start().to_rfc3339()
                ),
                context(),
            )
        })?;

    let samples = timeseries::decode_window(
        &record.data,
        stored_count,
        offset,
        requested.sample_count(),
    )
    .map_err(|e| RepositoryError::corrupt(e.to_string(), context()))?;

    Ok(Ephemeris {
        id: Some(record.id),
        satellite_id: record.satellite_id,
        horizon: *requested,
        samples,
    })
}

/// Intervals of a cached group as seen through `horizon`.
///
/// With `shrink`, an interval is kept only when it lies entirely inside the
/// horizon; intervals straddling either edge are dropped. Inclusion is gated
/// on the unclipped bounds, so the clip applied afterwards never changes a
/// kept interval.
pub fn select_intervals(
    satellite_id: SatelliteId,
    station_id: StationId,
    intervals: &[StoredInterval],
    horizon: &TimeHorizon,
    shrink: bool,
) -> Vec<Eligibility> {
    intervals
        .iter()
        .filter(|iv| !shrink || (iv.start >= horizon.start() && iv.end <= horizon.end()))
        .map(|iv| {
            let (start, end) = if shrink {
                (iv.start.max(horizon.start()), iv.end.min(horizon.end()))
            } else {
                (iv.start, iv.end)
            };
            Eligibility {
                id: Some(iv.id),
                satellite_id,
                station_id,
                start,
                end,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StateSample;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn horizon(start_s: i64, end_s: i64, step_s: i64) -> TimeHorizon {
        TimeHorizon::new(
            t0() + Duration::seconds(start_s),
            t0() + Duration::seconds(end_s),
            Duration::seconds(step_s),
        )
        .unwrap()
    }

    fn record(id: i64, h: TimeHorizon) -> StoredEphemeris {
        let samples: Vec<_> = (0..h.sample_count())
            .map(|i| StateSample::new([i as f64, 0.0, 0.0], [0.0, 0.0, 0.0]))
            .collect();
        StoredEphemeris {
            id: EphemerisId(id),
            satellite_id: SatelliteId(1),
            horizon: h,
            data: timeseries::encode(&samples),
        }
    }

    #[test]
    fn test_shrink_returns_requested_window() {
        let rec = record(1, horizon(0, 7200, 30));
        let eph = materialize_ephemeris(&rec, &horizon(1800, 3600, 30), true).unwrap();
        assert_eq!(eph.samples.len(), 61);
        assert_eq!(eph.samples[0].x, 60.0);
        assert_eq!(eph.horizon, horizon(1800, 3600, 30));
        assert_eq!(eph.id, Some(EphemerisId(1)));
    }

    #[test]
    fn test_no_shrink_returns_whole_record() {
        let rec = record(1, horizon(0, 7200, 30));
        let eph = materialize_ephemeris(&rec, &horizon(1800, 3600, 30), false).unwrap();
        assert_eq!(eph.samples.len(), 241);
        assert_eq!(eph.horizon, rec.horizon);
    }

    #[test]
    fn test_off_grid_start_is_misaligned() {
        let rec = record(1, horizon(0, 7200, 30));
        let err = materialize_ephemeris(&rec, &horizon(1815, 3615, 30), true).unwrap_err();
        assert!(matches!(err, RepositoryError::MisalignedHorizon { .. }));
    }

    #[test]
    fn test_truncated_blob_is_corrupt() {
        let mut rec = record(1, horizon(0, 7200, 30));
        rec.data.truncate(rec.data.len() - timeseries::ROW_BYTES);
        let err = materialize_ephemeris(&rec, &horizon(0, 60, 30), true).unwrap_err();
        assert!(matches!(err, RepositoryError::CorruptData { .. }));
    }

    #[test]
    fn test_select_covering_prefers_lowest_id() {
        let records = vec![
            record(3, horizon(0, 7200, 30)),
            record(2, horizon(0, 3600, 60)),
            record(1, horizon(-60, 7200, 30)),
        ];
        let chosen = select_covering(&records, &horizon(0, 3600, 30)).unwrap();
        assert_eq!(chosen.id, EphemerisId(1));
        assert!(select_covering(&records, &horizon(0, 7260, 30)).is_none());
    }

    #[test]
    fn test_partial_overlap_is_excluded_when_shrinking() {
        let t = |s: i64| t0() + Duration::seconds(s);
        let intervals = vec![
            StoredInterval {
                id: EligibilityId(1),
                start: t(-5),
                end: t(5),
            },
            StoredInterval {
                id: EligibilityId(2),
                start: t(8),
                end: t(12),
            },
        ];
        let h = horizon(0, 20, 1);

        let shrunk = select_intervals(SatelliteId(1), StationId(1), &intervals, &h, true);
        assert_eq!(shrunk.len(), 1);
        assert_eq!(shrunk[0].id, Some(EligibilityId(2)));
        assert_eq!((shrunk[0].start, shrunk[0].end), (t(8), t(12)));

        let all = select_intervals(SatelliteId(1), StationId(1), &intervals, &h, false);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].start, t(-5));
    }
}
