//! Entity repository contract and gateway-backed implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs for any `Entity` over a `StorageGateway`.
//! - Own the mapping between in-memory entities and stored rows.
//!
//! # Invariants
//! - Write paths call `Entity::validate()` (or `with_changes`) before any
//!   gateway mutation.
//! - Read paths reject invalid persisted state instead of masking it.
//! - `update` writes only the columns whose value actually changed.

use crate::model::{Entity, EntityError, EntityId, EntityMeta};
use crate::storage::{ListQuery, Predicate, Record, StorageError, StorageGateway, StoredRow};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(EntityError),
    NotFound { kind: &'static str, id: EntityId },
    AlreadyPersisted { kind: &'static str, id: EntityId },
    Storage(StorageError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::AlreadyPersisted { kind, id } => {
                write!(f, "{kind} {id} is already persisted")
            }
            Self::Storage(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::NotFound { .. } | Self::AlreadyPersisted { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<EntityError> for RepoError {
    fn from(value: EntityError) -> Self {
        Self::Validation(value)
    }
}

impl From<StorageError> for RepoError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Repository interface for entity CRUD operations.
pub trait EntityRepository<E: Entity> {
    /// Persists a new entity and returns it with id/timestamps populated.
    fn create(&self, entity: E) -> RepoResult<E>;
    /// Returns `None` for unknown ids; never errors on not-found.
    fn find_by_id(&self, id: EntityId) -> RepoResult<Option<E>>;
    /// Snapshot of matching entities, ascending id unless ordered otherwise.
    fn find_all(&self, query: &ListQuery) -> RepoResult<Vec<E>>;
    /// Applies `changes` to a stored entity.
    fn update(&self, id: EntityId, changes: &Record) -> RepoResult<E>;
    /// Inserts unpersisted entities, rewrites persisted ones in place.
    fn save(&self, entity: &mut E) -> RepoResult<()>;
    fn delete(&self, id: EntityId) -> RepoResult<bool>;
    /// Deletes by the entity's id and clears it on success.
    fn delete_entity(&self, entity: &mut E) -> RepoResult<bool>;
    fn count(&self, predicate: Option<&Predicate>) -> RepoResult<u64>;

    fn exists(&self, id: EntityId) -> RepoResult<bool> {
        Ok(self.find_by_id(id)?.is_some())
    }
}

impl<E: Entity, R: EntityRepository<E> + ?Sized> EntityRepository<E> for &R {
    fn create(&self, entity: E) -> RepoResult<E> {
        (**self).create(entity)
    }

    fn find_by_id(&self, id: EntityId) -> RepoResult<Option<E>> {
        (**self).find_by_id(id)
    }

    fn find_all(&self, query: &ListQuery) -> RepoResult<Vec<E>> {
        (**self).find_all(query)
    }

    fn update(&self, id: EntityId, changes: &Record) -> RepoResult<E> {
        (**self).update(id, changes)
    }

    fn save(&self, entity: &mut E) -> RepoResult<()> {
        (**self).save(entity)
    }

    fn delete(&self, id: EntityId) -> RepoResult<bool> {
        (**self).delete(id)
    }

    fn delete_entity(&self, entity: &mut E) -> RepoResult<bool> {
        (**self).delete_entity(entity)
    }

    fn count(&self, predicate: Option<&Predicate>) -> RepoResult<u64> {
        (**self).count(predicate)
    }

    fn exists(&self, id: EntityId) -> RepoResult<bool> {
        (**self).exists(id)
    }
}

/// Repository for entity type `E` over any storage gateway.
pub struct GatewayRepository<E, G> {
    gateway: G,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, G: StorageGateway> GatewayRepository<E, G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            _entity: PhantomData,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    fn row_to_entity(row: StoredRow) -> RepoResult<E> {
        let meta = EntityMeta {
            id: Some(row.id),
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        };
        E::from_record(meta, &row.fields).map_err(|err| {
            warn!(
                "event=row_decode module=repo status=error kind={} id={} field={}",
                E::KIND,
                row.id,
                err.field()
            );
            RepoError::InvalidData(format!("{} row {}: {err}", E::KIND, row.id))
        })
    }

    fn insert(&self, entity: &mut E) -> RepoResult<()> {
        let inserted = self.gateway.insert(E::TABLE, &entity.to_record())?;
        let meta = entity.meta_mut();
        meta.id = Some(inserted.id);
        meta.created_at = Some(inserted.created_at);
        meta.updated_at = Some(inserted.created_at);
        debug!(
            "event=entity_create module=repo status=ok kind={} id={}",
            E::KIND,
            inserted.id
        );
        Ok(())
    }
}

impl<E: Entity, G: StorageGateway> EntityRepository<E> for GatewayRepository<E, G> {
    fn create(&self, mut entity: E) -> RepoResult<E> {
        entity.validate()?;
        if let Some(id) = entity.id() {
            return Err(RepoError::AlreadyPersisted { kind: E::KIND, id });
        }
        self.insert(&mut entity)?;
        Ok(entity)
    }

    fn find_by_id(&self, id: EntityId) -> RepoResult<Option<E>> {
        self.gateway
            .get(E::TABLE, id)?
            .map(Self::row_to_entity)
            .transpose()
    }

    fn find_all(&self, query: &ListQuery) -> RepoResult<Vec<E>> {
        self.gateway
            .list(E::TABLE, query)?
            .into_iter()
            .map(Self::row_to_entity)
            .collect()
    }

    fn update(&self, id: EntityId, changes: &Record) -> RepoResult<E> {
        let current = self
            .find_by_id(id)?
            .ok_or(RepoError::NotFound { kind: E::KIND, id })?;
        let mut updated = current.with_changes(changes)?;

        let before = current.to_record();
        let changed: Record = updated
            .to_record()
            .into_iter()
            .filter(|(name, value)| before.get(name) != Some(value))
            .collect();

        let updated_at = self
            .gateway
            .update(E::TABLE, id, &changed)?
            .ok_or(RepoError::NotFound { kind: E::KIND, id })?;
        updated.meta_mut().updated_at = Some(updated_at);
        debug!(
            "event=entity_update module=repo status=ok kind={} id={} changed_fields={}",
            E::KIND,
            id,
            changed.len()
        );
        Ok(updated)
    }

    fn save(&self, entity: &mut E) -> RepoResult<()> {
        entity.validate()?;
        let Some(id) = entity.id() else {
            return self.insert(entity);
        };

        let updated_at = self
            .gateway
            .update(E::TABLE, id, &entity.to_record())?
            .ok_or(RepoError::NotFound { kind: E::KIND, id })?;
        entity.meta_mut().updated_at = Some(updated_at);
        debug!(
            "event=entity_save module=repo status=ok kind={} id={}",
            E::KIND,
            id
        );
        Ok(())
    }

    fn delete(&self, id: EntityId) -> RepoResult<bool> {
        let deleted = self.gateway.delete(E::TABLE, id)?;
        debug!(
            "event=entity_delete module=repo status=ok kind={} id={} deleted={}",
            E::KIND,
            id,
            deleted
        );
        Ok(deleted)
    }

    fn delete_entity(&self, entity: &mut E) -> RepoResult<bool> {
        let Some(id) = entity.id() else {
            return Ok(false);
        };
        let deleted = self.delete(id)?;
        if deleted {
            entity.meta_mut().id = None;
        }
        Ok(deleted)
    }

    fn count(&self, predicate: Option<&Predicate>) -> RepoResult<u64> {
        Ok(self.gateway.count(E::TABLE, predicate)?)
    }
}
