//! Generic entity use-case service.
//!
//! # Responsibility
//! - Provide CRUD entry points for any entity type.
//! - Run bulk operations item by item.
//!
//! # Invariants
//! - `bulk_create` never aborts on a failing item; each item either fully
//!   persists or is reported as a failure.

use super::{OperationContext, ServiceError, ServiceResult};
use crate::model::{Entity, EntityError, EntityId};
use crate::repo::EntityRepository;
use crate::storage::{ListQuery, Predicate, Record};
use log::info;
use std::marker::PhantomData;

/// One rejected item of a bulk create.
#[derive(Debug)]
pub struct BulkFailure {
    /// Position of the item in the input sequence.
    pub index: usize,
    pub error: ServiceError,
}

/// Outcome of a bulk create.
#[derive(Debug)]
pub struct BulkCreateReport<E> {
    pub created: Vec<E>,
    pub failures: Vec<BulkFailure>,
}

impl<E> BulkCreateReport<E> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Use-case service wrapper over an entity repository.
pub struct EntityService<E, R> {
    repo: R,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, R: EntityRepository<E>> EntityService<E, R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            _entity: PhantomData,
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn create(&self, entity: E) -> ServiceResult<E> {
        self.repo.create(entity).context("create")
    }

    pub fn get(&self, id: EntityId) -> ServiceResult<Option<E>> {
        self.repo.find_by_id(id).context("get")
    }

    pub fn list(&self, query: &ListQuery) -> ServiceResult<Vec<E>> {
        self.repo.find_all(query).context("list")
    }

    /// Every entity, ascending id.
    pub fn all(&self) -> ServiceResult<Vec<E>> {
        self.list(&ListQuery::default())
    }

    pub fn update(&self, id: EntityId, changes: &Record) -> ServiceResult<E> {
        self.repo.update(id, changes).context("update")
    }

    pub fn save(&self, entity: &mut E) -> ServiceResult<()> {
        self.repo.save(entity).context("save")
    }

    pub fn delete(&self, id: EntityId) -> ServiceResult<bool> {
        self.repo.delete(id).context("delete")
    }

    pub fn count(&self, predicate: Option<&Predicate>) -> ServiceResult<u64> {
        self.repo.count(predicate).context("count")
    }

    pub fn exists(&self, id: EntityId) -> ServiceResult<bool> {
        self.repo.exists(id).context("exists")
    }

    /// Builds and persists each item independently.
    ///
    /// Construction failures and repository failures are both recorded with
    /// the item's input index; remaining items are still attempted.
    pub fn bulk_create<T, I, F>(&self, items: I, mut build: F) -> BulkCreateReport<E>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(T) -> Result<E, EntityError>,
    {
        let mut report = BulkCreateReport {
            created: Vec::new(),
            failures: Vec::new(),
        };

        for (index, item) in items.into_iter().enumerate() {
            let outcome = build(item)
                .context("bulk_create")
                .and_then(|entity| self.repo.create(entity).context("bulk_create"));
            match outcome {
                Ok(entity) => report.created.push(entity),
                Err(error) => report.failures.push(BulkFailure { index, error }),
            }
        }

        info!(
            "event=bulk_create module=service status={} kind={} created={} failed={}",
            if report.is_complete() { "ok" } else { "partial" },
            E::KIND,
            report.created.len(),
            report.failures.len()
        );
        report
    }

    /// Deletes every id, returning how many rows were actually removed.
    pub fn bulk_delete(&self, ids: &[EntityId]) -> ServiceResult<u64> {
        let mut deleted = 0;
        for id in ids {
            if self.repo.delete(*id).context("bulk_delete")? {
                deleted += 1;
            }
        }
        info!(
            "event=bulk_delete module=service status=ok kind={} requested={} deleted={}",
            E::KIND,
            ids.len(),
            deleted
        );
        Ok(deleted)
    }
}
