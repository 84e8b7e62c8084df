//! Repository trait definitions for the horizon-aware cache.
//!
//! Responsibilities are split across focused traits so that backends and
//! test doubles can be reasoned about one concern at a time.
//!
//! # Module Organization
//!
//! - [`error`]: Error types for repository operations
//! - [`ephemeris`]: Covering lookups of cached state time series
//! - [`eligibility`]: Batched lookups of cached visibility groups
//! - [`registry`]: Deduplicating storage of satellites and stations
//! - [`transaction`]: All-or-nothing commit of staged writes
//!
//! # Convenience Trait Bound
//!
//! Services that need every capability take a [`FullRepository`]:
//!
//! ```ignore
//! async fn warm<R: FullRepository + ?Sized>(repo: &R, unit: UnitOfWork) -> RepositoryResult<()> {
//!     repo.commit(unit).await?;
//!     Ok(())
//! }
//! ```

pub mod eligibility;
pub mod ephemeris;
pub mod error;
pub mod registry;
pub mod transaction;

// Re-export error types
pub use error::{ErrorContext, RepositoryError, RepositoryResult};

// Re-export all traits
pub use eligibility::{EligibilityLookup, EligibilityQuery, EligibilityRepository};
pub use ephemeris::EphemerisRepository;
pub use registry::{EntityId, EntityRegistry, RegistryEntity};
pub use transaction::TransactionRepository;

use crate::models::{Eligibility, Satellite, Station};

/// Composite trait bound for a complete repository implementation.
///
/// Automatically implemented for any type that implements every repository
/// trait, including the registry for each referenced entity.
pub trait FullRepository:
    EphemerisRepository
    + EligibilityRepository
    + EntityRegistry<Satellite>
    + EntityRegistry<Station>
    + EntityRegistry<Eligibility>
    + TransactionRepository
{
}

// Blanket implementation: any type implementing all traits automatically implements FullRepository
impl<T> FullRepository for T where
    T: EphemerisRepository
        + EligibilityRepository
        + EntityRegistry<Satellite>
        + EntityRegistry<Station>
        + EntityRegistry<Eligibility>
        + TransactionRepository
{
}
