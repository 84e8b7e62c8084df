//! Deduplicating registry of referenced entities.
//!
//! Satellites and stations are referenced by many cache rows; the registry
//! guarantees each is persisted once. Eligibility intervals are readable
//! through the same interface but can only be written as part of a group.

use std::fmt;
use std::hash::Hash;

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{Eligibility, EligibilityId, Satellite, SatelliteId, Station, StationId};

/// An entity with an optional persisted identity.
pub trait RegistryEntity: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + fmt::Display + Send + Sync + 'static;

    /// Name used in error contexts and logs.
    const ENTITY: &'static str;

    fn id(&self) -> Option<Self::Id>;
}

/// Identifier type that names its entity, so that lookups by id infer the
/// registry to use.
pub trait EntityId: Copy + fmt::Display + Send + Sync + 'static {
    type Entity: RegistryEntity<Id = Self>;
}

impl RegistryEntity for Satellite {
    type Id = SatelliteId;
    const ENTITY: &'static str = "satellite";

    fn id(&self) -> Option<SatelliteId> {
        self.id
    }
}

impl EntityId for SatelliteId {
    type Entity = Satellite;
}

impl RegistryEntity for Station {
    type Id = StationId;
    const ENTITY: &'static str = "station";

    fn id(&self) -> Option<StationId> {
        self.id
    }
}

impl EntityId for StationId {
    type Entity = Station;
}

impl RegistryEntity for Eligibility {
    type Id = EligibilityId;
    const ENTITY: &'static str = "eligibility";

    fn id(&self) -> Option<EligibilityId> {
        self.id
    }
}

impl EntityId for EligibilityId {
    type Entity = Eligibility;
}

#[async_trait]
pub trait EntityRegistry<E: RegistryEntity>: Send + Sync {
    /// Look an entity up by id.
    async fn load(&self, id: E::Id) -> RepositoryResult<Option<E>>;

    /// Persist an entity and return the persisted copy.
    ///
    /// An entity without id gets a fresh one; an entity carrying an id is
    /// persisted under that id.
    ///
    /// # Returns
    /// * `Err(RepositoryError::UniqueViolation)` - The id is already taken
    /// * `Err(RepositoryError::UnsupportedOperation)` - The entity can only be
    ///   written as part of an aggregate
    async fn store(&self, entity: &E) -> RepositoryResult<E>;

    /// Delete an entity and everything that references it.
    ///
    /// # Returns
    /// * `Ok(true)` if the entity existed
    async fn delete(&self, id: E::Id) -> RepositoryResult<bool>;

    /// Page through persisted entities in id order.
    async fn list(&self, offset: usize, limit: usize) -> RepositoryResult<Vec<E>>;

    /// Return the persisted copy of `entity`, storing it first if needed.
    ///
    /// When `entity` carries an id that is already persisted, the persisted
    /// record is returned unchanged and the in-memory fields are ignored.
    async fn store_or_load(&self, entity: &E) -> RepositoryResult<E> {
        if let Some(id) = entity.id() {
            if let Some(existing) = self.load(id).await? {
                return Ok(existing);
            }
        }
        self.store(entity).await
    }
}
