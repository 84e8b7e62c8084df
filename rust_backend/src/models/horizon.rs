//! Sampled time ranges.
//!
//! A [`TimeHorizon`] is the leaf value used by every cache lookup: a closed
//! interval `[start, end]` sampled every `step`. Steps are persisted as whole
//! milliseconds, so construction rejects anything finer. Instants are kept to
//! microsecond precision, the resolution of the relational timestamp columns.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NANOS_PER_SECOND: i128 = 1_000_000_000;
const NANOS_PER_MILLI: i128 = 1_000_000;
const NANOS_PER_MICRO: u32 = 1_000;

/// Reasons a horizon cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HorizonError {
    #[error("horizon end {end} must be after start {start}")]
    EmptyRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("horizon step must be positive, got {0}")]
    NonPositiveStep(Duration),

    #[error("horizon step {0} is not a whole number of milliseconds")]
    SubMillisecondStep(Duration),

    #[error("horizon step of {0}ms is out of range")]
    StepOutOfRange(i64),

    #[error("horizon instant {0} is finer than a microsecond")]
    SubMicrosecondInstant(DateTime<Utc>),
}

/// Immutable sampled time range.
///
/// Invariants: `end > start`, `step > 0`, `step` is a whole number of
/// milliseconds, and both bounds are whole microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "HorizonRepr", into = "HorizonRepr")]
pub struct TimeHorizon {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
}

/// Wire representation: the step travels as integer milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HorizonRepr {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step_ms: i64,
}

impl TryFrom<HorizonRepr> for TimeHorizon {
    type Error = HorizonError;

    fn try_from(repr: HorizonRepr) -> Result<Self, Self::Error> {
        TimeHorizon::from_millis(repr.start, repr.end, repr.step_ms)
    }
}

impl From<TimeHorizon> for HorizonRepr {
    fn from(horizon: TimeHorizon) -> Self {
        HorizonRepr {
            start: horizon.start,
            end: horizon.end,
            step_ms: horizon.step_ms(),
        }
    }
}

impl TimeHorizon {
    /// Build a validated horizon.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Self, HorizonError> {
        if end <= start {
            return Err(HorizonError::EmptyRange { start, end });
        }
        for instant in [start, end] {
            if instant.timestamp_subsec_nanos() % NANOS_PER_MICRO != 0 {
                return Err(HorizonError::SubMicrosecondInstant(instant));
            }
        }
        if step <= Duration::zero() {
            return Err(HorizonError::NonPositiveStep(step));
        }
        if nanos(step) % NANOS_PER_MILLI != 0 {
            return Err(HorizonError::SubMillisecondStep(step));
        }
        Ok(Self { start, end, step })
    }

    /// Build a horizon whose step is given in milliseconds, the persisted unit.
    pub fn from_millis(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_ms: i64,
    ) -> Result<Self, HorizonError> {
        let step =
            Duration::try_milliseconds(step_ms).ok_or(HorizonError::StepOutOfRange(step_ms))?;
        Self::new(start, end, step)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Step in whole milliseconds.
    pub fn step_ms(&self) -> i64 {
        self.step.num_milliseconds()
    }

    /// Same range, different sampling step.
    pub fn with_step(&self, step: Duration) -> Result<Self, HorizonError> {
        Self::new(self.start, self.end, step)
    }

    /// Number of samples: `floor((end - start) / step) + 1`.
    ///
    /// When the range is not a whole number of steps the last sample falls
    /// strictly before `end`.
    pub fn sample_count(&self) -> usize {
        (nanos(self.end - self.start) / nanos(self.step)) as usize + 1
    }

    /// True when `self` can serve `other` without resampling: identical step
    /// and `[other.start, other.end]` inside `[self.start, self.end]`.
    pub fn covers(&self, other: &TimeHorizon) -> bool {
        self.step == other.step && self.start <= other.start && self.end >= other.end
    }

    /// Index of the sample taken at `instant`, if `instant` falls exactly on
    /// the sampling grid and not before `start`.
    pub fn sample_index(&self, instant: DateTime<Utc>) -> Option<usize> {
        let offset = nanos(instant - self.start);
        if offset < 0 {
            return None;
        }
        let step = nanos(self.step);
        if offset % step != 0 {
            return None;
        }
        Some((offset / step) as usize)
    }

    /// Instant of the `index`-th sample.
    pub fn epoch(&self, index: usize) -> DateTime<Utc> {
        self.start + Duration::milliseconds(self.step_ms() * index as i64)
    }

    /// Every sampling instant, in order.
    pub fn epochs(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        (0..self.sample_count()).map(move |i| self.epoch(i))
    }

    /// True when `instant` lies inside the closed range.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

impl fmt::Display for TimeHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} .. {}] every {}ms",
            self.start.to_rfc3339(),
            self.end.to_rfc3339(),
            self.step_ms()
        )
    }
}

fn nanos(d: Duration) -> i128 {
    d.num_seconds() as i128 * NANOS_PER_SECOND + d.subsec_nanos() as i128
}
