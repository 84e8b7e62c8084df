//! Atomic commit of staged cache writes.

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::db::unit_of_work::{CommitReport, UnitOfWork};

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Check if the storage backend is reachable.
    ///
    /// # Returns
    /// - `Ok(true)` if connection is healthy
    /// - `Ok(false)` if connection is unhealthy but no error occurred
    /// - `Err(RepositoryError)` if an error occurred during the check
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Persist every staged record of `unit` in one transaction.
    ///
    /// Either all records are written or none is.
    ///
    /// # Returns
    /// * `Ok(CommitReport)` - Ids assigned, in staging order
    /// * `Err(RepositoryError::UniqueViolation)` - A staged ephemeris or group
    ///   duplicates an existing natural key; nothing was written
    /// * `Err(RepositoryError::ValidationError)` - A staged row references a
    ///   missing satellite, station or ephemeris, or a group interval lies
    ///   outside its ephemeris horizon
    async fn commit(&self, unit: UnitOfWork) -> RepositoryResult<CommitReport>;
}
