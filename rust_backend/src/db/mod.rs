//! Persistence layer of the horizon-aware cache.
//!
//! Storage is reached through the Repository pattern so that backends can be
//! swapped without touching the computation pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Orchestration (crate::services) / CLI                  │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs)                            │
//! │  - Single-record store / extract                        │
//! │  - Horizon listings, registry helpers                   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Traits (repository/) + UnitOfWork           │
//! │  Coverage rules shared by backends (coverage.rs)        │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴────────────────┐
//!     │                                │
//! ┌───▼──────────────┐     ┌───────────▼─────────────┐
//! │ Postgres (Diesel)│     │ Local Repository        │
//! │ postgres-repo    │     │ (in-memory)             │
//! └──────────────────┘     └─────────────────────────┘
//! ```
//!
//! # Recommended Usage
//!
//! ```ignore
//! use smartlink_rust::db::{services, RepositoryFactory};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = RepositoryFactory::from_env().await?;
//!     let horizons = services::list_horizons(repo.as_ref(), 1.into()).await?;
//!     Ok(())
//! }
//! ```

// Feature flag priority: postgres > local
// When multiple features are enabled (e.g., --all-features), postgres takes precedence.
#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod coverage;
pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;
pub mod services;
pub mod unit_of_work;

// Postgres config is colocated with the repository implementation.
#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::{PoolStats, PostgresConfig};
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}

pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
pub use repo_config::{ComputeSettings, RepositoryConfig};
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    EligibilityLookup, EligibilityQuery, EligibilityRepository, EntityId, EntityRegistry,
    EphemerisRepository, ErrorContext, FullRepository, RegistryEntity, RepositoryError,
    RepositoryResult, TransactionRepository,
};
pub use unit_of_work::{CommitReport, EphemerisRef, UnitOfWork};

use anyhow::{Context, Result};
use std::sync::{Arc, OnceLock};
#[cfg(feature = "postgres-repo")]
use tokio::runtime::Runtime;

/// Global repository instance initialized once per process.
static REPOSITORY: OnceLock<Arc<dyn FullRepository>> = OnceLock::new();

// Priority: postgres > local (when --all-features is used)
#[cfg(feature = "postgres-repo")]
async fn create_selected_repository() -> RepositoryResult<Arc<dyn FullRepository>> {
    let config = PostgresConfig::from_env().map_err(RepositoryError::configuration)?;
    let repo = RepositoryFactory::create_postgres(&config).await?;
    Ok(repo as Arc<dyn FullRepository>)
}

#[cfg(all(feature = "local-repo", not(feature = "postgres-repo")))]
fn create_selected_repository() -> RepositoryResult<Arc<dyn FullRepository>> {
    Ok(RepositoryFactory::create_local())
}

/// Initialize the global repository singleton for the selected backend.
#[cfg(feature = "postgres-repo")]
pub fn init_repository() -> Result<()> {
    if REPOSITORY.get().is_some() {
        return Ok(());
    }

    let runtime = Runtime::new().context("Failed to create async runtime for repository init")?;
    let repo = runtime
        .block_on(create_selected_repository())
        .map_err(|e| anyhow::Error::msg(e.to_string()))?;
    let _ = REPOSITORY.set(repo);
    Ok(())
}

/// Initialize the global repository singleton for the selected backend.
#[cfg(all(feature = "local-repo", not(feature = "postgres-repo")))]
pub fn init_repository() -> Result<()> {
    if REPOSITORY.get().is_some() {
        return Ok(());
    }

    let repo = create_selected_repository()?;
    let _ = REPOSITORY.set(repo);
    Ok(())
}

/// Install an already built repository as the process-wide instance.
///
/// Returns `false` when a repository was installed before.
pub fn install_repository(repo: Arc<dyn FullRepository>) -> bool {
    REPOSITORY.set(repo).is_ok()
}

/// Get a reference to the global repository instance.
pub fn get_repository() -> Result<&'static Arc<dyn FullRepository>> {
    if REPOSITORY.get().is_none() {
        let _ = init_repository();
    }

    REPOSITORY
        .get()
        .context("Database not initialized. Call init_repository() first.")
}
