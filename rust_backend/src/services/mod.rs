//! Service layer for request orchestration.
//!
//! Services sit between the request types of [`crate::api`] and the cache in
//! [`crate::db`]. They decide what can be answered from storage, invoke the
//! [`crate::compute`] capabilities for the rest and commit the new results
//! in one unit of work.

pub mod eligibility;
pub mod ephemeris;

pub use eligibility::{
    BatchComputeOrchestrator, EligibilityBatch, EligibilityOutcome, LinkEligibilities,
    LinkSource,
};
pub use ephemeris::{EphemerisBatch, EphemerisOutcome, SatelliteEphemeris};

use thiserror::Error;

use crate::compute::ComputeError;
use crate::db::RepositoryError;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request could not be parsed.
    #[error("invalid request at '{path}': {message}")]
    InvalidRequest { path: String, message: String },

    /// The request parsed but references unknown entities or inconsistent
    /// values.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Compute(#[from] ComputeError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True when the caller sent a request that can never succeed as is.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidRequest { .. } | Self::Validation(_) => true,
            Self::Repository(e) => matches!(
                e,
                RepositoryError::MisalignedHorizon { .. } | RepositoryError::ValidationError { .. }
            ),
            Self::Compute(e) => matches!(e, ComputeError::UnknownBackend(_)),
        }
    }
}
