//! High-level database service layer.
//!
//! Repository-agnostic operations that work with any implementation of the
//! repository traits. The batch pipeline in [`crate::services`] builds on
//! these; applications that only need cache reads and writes can call them
//! directly.
//!
//! # Usage
//!
//! ```
//! use smartlink_rust::db::{services, repositories::LocalRepository};
//! use smartlink_rust::models::SatelliteId;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let repo = LocalRepository::new();
//! let horizons = services::list_horizons(&repo, SatelliteId(1)).await.unwrap();
//! assert!(horizons.is_empty());
//! # });
//! ```

use log::{debug, info};

use super::repository::{
    EntityId, EntityRegistry, EphemerisRepository, RegistryEntity, RepositoryError,
    RepositoryResult, TransactionRepository,
};
use super::unit_of_work::{EphemerisRef, UnitOfWork};
use crate::models::{
    Constellation, Ephemeris, EphemerisId, Satellite, SatelliteId, TimeHorizon,
};

// ==================== Health & Connection ====================

/// Check if the storage backend is reachable.
pub async fn health_check<R: TransactionRepository + ?Sized>(repo: &R) -> RepositoryResult<bool> {
    repo.health_check().await
}

// ==================== Ephemeris Operations ====================

/// Persist one ephemeris record and return its id.
///
/// An ephemeris that already carries an id is returned as is. Storing a
/// second record with the same satellite and horizon fails with
/// [`RepositoryError::UniqueViolation`].
pub async fn store_ephemeris<R>(repo: &R, ephemeris: &Ephemeris) -> RepositoryResult<EphemerisId>
where
    R: TransactionRepository + ?Sized,
{
    let mut unit = UnitOfWork::new();
    match unit.stage_ephemeris(ephemeris)? {
        EphemerisRef::Stored(id) => Ok(id),
        EphemerisRef::Staged(_) => {
            let report = repo.commit(unit).await?;
            let id = report.ephemeris_ids.first().copied().ok_or_else(|| {
                RepositoryError::internal("commit reported no id for the staged ephemeris")
            })?;
            info!(
                "Stored ephemeris {} for satellite {} over {}",
                id, ephemeris.satellite_id, ephemeris.horizon
            );
            Ok(id)
        }
    }
}

/// Look up a cached ephemeris serving `horizon`.
pub async fn extract_ephemeris<R>(
    repo: &R,
    satellite_id: SatelliteId,
    horizon: &TimeHorizon,
    shrink: bool,
) -> RepositoryResult<Option<Ephemeris>>
where
    R: EphemerisRepository + ?Sized,
{
    let found = repo.extract_ephemeris(satellite_id, horizon, shrink).await?;
    debug!(
        "Ephemeris lookup for satellite {} over {}: {}",
        satellite_id,
        horizon,
        if found.is_some() { "hit" } else { "miss" }
    );
    Ok(found)
}

/// Every distinct horizon cached for one satellite.
pub async fn list_horizons<R>(repo: &R, satellite_id: SatelliteId) -> RepositoryResult<Vec<TimeHorizon>>
where
    R: EphemerisRepository + ?Sized,
{
    repo.list_horizons(satellite_id).await
}

/// Horizons cached for every satellite in `satellites`, in the order of the
/// first satellite's listing. Empty when `satellites` is empty.
pub async fn common_horizons<R>(
    repo: &R,
    satellites: &[SatelliteId],
) -> RepositoryResult<Vec<TimeHorizon>>
where
    R: EphemerisRepository + ?Sized,
{
    let Some((first, rest)) = satellites.split_first() else {
        return Ok(Vec::new());
    };

    let mut common = repo.list_horizons(*first).await?;
    for satellite_id in rest {
        if common.is_empty() {
            break;
        }
        let available = repo.list_horizons(*satellite_id).await?;
        common.retain(|h| available.contains(h));
    }
    Ok(common)
}

// ==================== Registry Operations ====================

/// Load any registered entity by its id; the id type selects the registry.
pub async fn load_entity<I, R>(repo: &R, id: I) -> RepositoryResult<Option<I::Entity>>
where
    I: EntityId,
    R: EntityRegistry<I::Entity> + ?Sized,
{
    repo.load(id).await
}

/// Load an entity that must exist, failing with `NotFound` otherwise.
pub async fn require_entity<I, R>(repo: &R, id: I) -> RepositoryResult<I::Entity>
where
    I: EntityId,
    R: EntityRegistry<I::Entity> + ?Sized,
{
    repo.load(id).await?.ok_or_else(|| {
        RepositoryError::not_found(format!(
            "{} {} is not registered",
            <I::Entity as RegistryEntity>::ENTITY,
            id
        ))
    })
}

/// Return the persisted copy of `entity`, storing it first if needed.
pub async fn store_or_load<E, R>(repo: &R, entity: &E) -> RepositoryResult<E>
where
    E: RegistryEntity,
    R: EntityRegistry<E> + ?Sized,
{
    repo.store_or_load(entity).await
}

/// Register every satellite of a constellation, writing the persisted ids
/// back into the arena.
pub async fn register_constellation<R>(
    repo: &R,
    constellation: &mut Constellation,
) -> RepositoryResult<Vec<SatelliteId>>
where
    R: EntityRegistry<Satellite> + ?Sized,
{
    let mut ids = Vec::with_capacity(constellation.len());
    for satellite in constellation.satellites_mut() {
        let stored = repo.store_or_load(satellite).await?;
        satellite.id = stored.id;
        ids.extend(stored.id);
    }
    info!(
        "Registered {} satellites of constellation {}",
        ids.len(),
        constellation.name
    );
    Ok(ids)
}
