//! Staged cache writes committed all-or-nothing.
//!
//! A [`UnitOfWork`] collects freshly computed ephemerides and eligibility
//! groups for one request. Nothing reaches storage until the unit is handed
//! to [`TransactionRepository::commit`](super::repository::TransactionRepository::commit);
//! dropping a unit discards everything it staged.

use chrono::Duration;

use super::repository::{ErrorContext, RepositoryError, RepositoryResult};
use crate::codec::{timeseries, MaskKey};
use crate::models::{
    EligibilityGroupId, Ephemeris, EphemerisId, SatelliteId, StationId, TimeHorizon,
    VisibilityWindow,
};

/// Ephemeris a group is computed from: either already persisted or staged
/// earlier in the same unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EphemerisRef {
    Stored(EphemerisId),
    Staged(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedEphemeris {
    pub satellite_id: SatelliteId,
    pub horizon: TimeHorizon,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedGroup {
    pub ephemeris: EphemerisRef,
    pub station_id: StationId,
    pub mask: MaskKey,
    pub step_ms: i64,
    pub backend: String,
    pub intervals: Vec<VisibilityWindow>,
}

/// Ids assigned by a successful commit, index-aligned with the staging order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub ephemeris_ids: Vec<EphemerisId>,
    pub group_ids: Vec<EligibilityGroupId>,
}

#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    ephemerides: Vec<StagedEphemeris>,
    groups: Vec<StagedGroup>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an ephemeris for insertion.
    ///
    /// An ephemeris that already carries an id is persisted; it is returned
    /// as a [`EphemerisRef::Stored`] reference without staging anything.
    pub fn stage_ephemeris(&mut self, ephemeris: &Ephemeris) -> RepositoryResult<EphemerisRef> {
        if let Some(id) = ephemeris.id {
            return Ok(EphemerisRef::Stored(id));
        }

        let expected = ephemeris.horizon.sample_count();
        if ephemeris.samples.len() != expected {
            return Err(RepositoryError::validation_with_context(
                format!(
                    "ephemeris over {} needs {} samples, got {}",
                    ephemeris.horizon,
                    expected,
                    ephemeris.samples.len()
                ),
                ErrorContext::new("stage_ephemeris")
                    .with_entity("ephemeris")
                    .with_details(format!("satellite_id={}", ephemeris.satellite_id)),
            ));
        }

        self.ephemerides.push(StagedEphemeris {
            satellite_id: ephemeris.satellite_id,
            horizon: ephemeris.horizon,
            data: timeseries::encode(&ephemeris.samples),
        });
        Ok(EphemerisRef::Staged(self.ephemerides.len() - 1))
    }

    /// Stage an eligibility group computed from `ephemeris`.
    ///
    /// Intervals are checked against the horizon of a staged ephemeris here;
    /// groups on stored ephemerides are checked by the backend at commit.
    pub fn create_group(
        &mut self,
        ephemeris: EphemerisRef,
        station_id: StationId,
        intervals: Vec<VisibilityWindow>,
        mask: MaskKey,
        interpolation_step: Duration,
        backend: impl Into<String>,
    ) -> RepositoryResult<usize> {
        let context = || {
            ErrorContext::new("create_group")
                .with_entity("eligibility_group")
                .with_details(format!("station_id={}", station_id))
        };

        if let EphemerisRef::Staged(index) = ephemeris {
            let staged = self.ephemerides.get(index).ok_or_else(|| {
                RepositoryError::validation_with_context(
                    format!("no staged ephemeris at index {}", index),
                    context(),
                )
            })?;
            check_intervals(&staged.horizon, &intervals).map_err(|message| {
                RepositoryError::validation_with_context(message, context())
            })?;
        }

        let step_ms = interpolation_step.num_milliseconds();
        if step_ms <= 0 || Duration::milliseconds(step_ms) != interpolation_step {
            return Err(RepositoryError::validation_with_context(
                format!(
                    "interpolation step must be a positive whole number of milliseconds, got {}",
                    interpolation_step
                ),
                context(),
            ));
        }

        self.groups.push(StagedGroup {
            ephemeris,
            station_id,
            mask,
            step_ms,
            backend: backend.into(),
            intervals,
        });
        Ok(self.groups.len() - 1)
    }

    pub fn ephemerides(&self) -> &[StagedEphemeris] {
        &self.ephemerides
    }

    pub fn groups(&self) -> &[StagedGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.ephemerides.is_empty() && self.groups.is_empty()
    }

    pub fn into_parts(self) -> (Vec<StagedEphemeris>, Vec<StagedGroup>) {
        (self.ephemerides, self.groups)
    }
}

/// Every interval must be well ordered and inside `horizon`.
pub(crate) fn check_intervals(
    horizon: &TimeHorizon,
    intervals: &[VisibilityWindow],
) -> Result<(), String> {
    for iv in intervals {
        if iv.end < iv.start {
            return Err(format!(
                "interval [{}, {}] ends before it starts",
                iv.start.to_rfc3339(),
                iv.end.to_rfc3339()
            ));
        }
        if !horizon.contains(iv.start) || !horizon.contains(iv.end) {
            return Err(format!(
                "interval [{}, {}] lies outside ephemeris horizon {}",
                iv.start.to_rfc3339(),
                iv.end.to_rfc3339(),
                horizon
            ));
        }
    }
    Ok(())
}
