//! External computation capabilities consumed by the batch pipeline.
//!
//! The cache treats orbital propagation, frame conversion and visibility
//! computation as black boxes behind the traits of this module. Reference
//! implementations are provided so the pipeline runs end to end:
//!
//! - [`kepler::KeplerPropagator`]: two-body propagation of classical elements
//! - [`frames::EarthRotation`]: inertial to Earth-fixed through the mean
//!   sidereal angle
//! - [`visibility::ElevationVisibility`]: elevation above a ground location
//!   compared against an azimuth-dependent mask
//!
//! All capabilities are synchronous; callers on an async runtime decide
//! whether to move them to a blocking thread.

pub mod frames;
pub mod kepler;
pub mod visibility;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    ElevationMask, Ephemeris, GroundLocation, Satellite, StateSample, TimeHorizon,
    VisibilityWindow,
};

pub use frames::EarthRotation;
pub use kepler::KeplerPropagator;
pub use visibility::ElevationVisibility;

/// Identifier of the visibility backend used when none is requested.
pub const DEFAULT_VISIBILITY_BACKEND: &str = "elevation";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputeError {
    #[error("propagation failed for satellite {satellite}: {message}")]
    Propagation { satellite: String, message: String },

    #[error("frame conversion failed: {0}")]
    FrameConversion(String),

    #[error("visibility computation failed: {0}")]
    Visibility(String),

    #[error("unknown visibility backend '{0}'")]
    UnknownBackend(String),
}

/// How visibility samples are resampled between ephemeris epochs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    #[default]
    Linear,
    /// Cubic Hermite, using the sampled velocities as tangents.
    Cubic,
}

impl FromStr for InterpolationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "cubic" => Ok(Self::Cubic),
            _ => Err(format!("Unknown interpolation method: {}", s)),
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => f.write_str("linear"),
            Self::Cubic => f.write_str("cubic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationSettings {
    pub step: Duration,
    pub method: InterpolationMethod,
}

/// Produces inertial state vectors for a satellite.
pub trait Propagator: Send + Sync {
    /// One sample per epoch of `horizon`, in order.
    fn propagate(
        &self,
        satellite: &Satellite,
        horizon: &TimeHorizon,
    ) -> Result<Vec<StateSample>, ComputeError>;
}

/// Converts inertial samples into the Earth-fixed frame the cache persists.
pub trait FrameConversion: Send + Sync {
    fn inertial_to_fixed(
        &self,
        horizon: &TimeHorizon,
        samples: &[StateSample],
    ) -> Result<Vec<StateSample>, ComputeError>;
}

/// Computes the windows during which a ground location sees a satellite.
pub trait EligibilityComputation: Send + Sync {
    /// Windows are ordered, disjoint and lie within `ephemeris.horizon`.
    fn compute(
        &self,
        ephemeris: &Ephemeris,
        location: &GroundLocation,
        mask: &ElevationMask,
        settings: &InterpolationSettings,
    ) -> Result<Vec<VisibilityWindow>, ComputeError>;
}

/// Visibility implementations by the identifier persisted in cache keys.
#[derive(Clone)]
pub struct VisibilityBackends {
    backends: BTreeMap<String, Arc<dyn EligibilityComputation>>,
}

impl VisibilityBackends {
    /// Registry with no backend.
    pub fn empty() -> Self {
        Self {
            backends: BTreeMap::new(),
        }
    }

    pub fn register(
        mut self,
        name: impl Into<String>,
        backend: Arc<dyn EligibilityComputation>,
    ) -> Self {
        self.backends.insert(name.into(), backend);
        self
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn EligibilityComputation>, ComputeError> {
        self.backends
            .get(name)
            .ok_or_else(|| ComputeError::UnknownBackend(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }
}

impl Default for VisibilityBackends {
    /// [`ElevationVisibility`] under [`DEFAULT_VISIBILITY_BACKEND`].
    fn default() -> Self {
        Self::empty().register(
            DEFAULT_VISIBILITY_BACKEND,
            Arc::new(ElevationVisibility::default()),
        )
    }
}

impl fmt::Debug for VisibilityBackends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
