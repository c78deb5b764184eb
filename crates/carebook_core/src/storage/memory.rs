//! In-process storage gateway backed by ordered maps.
//!
//! # Responsibility
//! - Back tests and demos without a database file.
//! - Honor the same listing/ordering contract as the SQLite gateway.
//!
//! # Invariants
//! - Ids start at 1 per table and are never reused, even after delete.
//! - Each call holds the table lock for its whole duration.

use super::{
    compare_rows, ensure_identifier, ensure_writable_fields, now_millis, Inserted, ListQuery,
    Predicate, Record, StorageError, StorageGateway, StorageResult, StoredRow,
};
use crate::model::EntityId;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryTable {
    last_id: i64,
    rows: BTreeMap<EntityId, StoredRow>,
}

/// Storage gateway keeping every table in an in-process `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    tables: Mutex<BTreeMap<String, MemoryTable>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, BTreeMap<String, MemoryTable>>> {
        self.tables.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl StorageGateway for MemoryGateway {
    fn insert(&self, table: &str, fields: &Record) -> StorageResult<Inserted> {
        ensure_identifier(table)?;
        ensure_writable_fields(fields)?;

        let mut tables = self.lock()?;
        let state = tables.entry(table.to_string()).or_default();
        let next = state.last_id + 1;
        let id = EntityId::new(next)
            .ok_or_else(|| StorageError::InvalidData(format!("id overflow in `{table}`")))?;
        let created_at = now_millis();

        state.last_id = next;
        state.rows.insert(
            id,
            StoredRow {
                id,
                created_at,
                updated_at: created_at,
                fields: fields.clone(),
            },
        );

        Ok(Inserted { id, created_at })
    }

    fn get(&self, table: &str, id: EntityId) -> StorageResult<Option<StoredRow>> {
        ensure_identifier(table)?;
        let tables = self.lock()?;
        Ok(tables
            .get(table)
            .and_then(|state| state.rows.get(&id))
            .cloned())
    }

    fn list(&self, table: &str, query: &ListQuery) -> StorageResult<Vec<StoredRow>> {
        ensure_identifier(table)?;
        let tables = self.lock()?;
        let Some(state) = tables.get(table) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<StoredRow> = state
            .rows
            .values()
            .filter(|row| query.predicate.as_ref().map_or(true, |p| p.matches(row)))
            .cloned()
            .collect();
        drop(tables);

        rows.sort_by(|left, right| compare_rows(&query.order, left, right));

        let offset = query.offset as usize;
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    fn update(
        &self,
        table: &str,
        id: EntityId,
        changed: &Record,
    ) -> StorageResult<Option<DateTime<Utc>>> {
        ensure_identifier(table)?;
        ensure_writable_fields(changed)?;

        let mut tables = self.lock()?;
        let Some(row) = tables
            .get_mut(table)
            .and_then(|state| state.rows.get_mut(&id))
        else {
            return Ok(None);
        };

        for (name, value) in changed {
            row.fields.insert(name.clone(), value.clone());
        }
        row.updated_at = row.updated_at.max(now_millis());

        Ok(Some(row.updated_at))
    }

    fn delete(&self, table: &str, id: EntityId) -> StorageResult<bool> {
        ensure_identifier(table)?;
        let mut tables = self.lock()?;
        Ok(tables
            .get_mut(table)
            .is_some_and(|state| state.rows.remove(&id).is_some()))
    }

    fn count(&self, table: &str, predicate: Option<&Predicate>) -> StorageResult<u64> {
        ensure_identifier(table)?;
        let tables = self.lock()?;
        let count = tables.get(table).map_or(0, |state| {
            state
                .rows
                .values()
                .filter(|row| predicate.map_or(true, |p| p.matches(row)))
                .count()
        });
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryGateway;
    use crate::storage::{FieldValue, ListQuery, OrderBy, Predicate, Record, StorageGateway};

    fn record(name: &str) -> Record {
        let mut fields = Record::new();
        fields.insert("name".to_string(), FieldValue::text(name));
        fields
    }

    #[test]
    fn ids_are_sequential_and_not_reused_after_delete() {
        let gateway = MemoryGateway::new();
        let first = gateway.insert("people", &record("a")).unwrap();
        let second = gateway.insert("people", &record("b")).unwrap();
        assert_eq!(first.id.get(), 1);
        assert_eq!(second.id.get(), 2);

        assert!(gateway.delete("people", second.id).unwrap());
        assert!(!gateway.delete("people", second.id).unwrap());

        let third = gateway.insert("people", &record("c")).unwrap();
        assert_eq!(third.id.get(), 3);
    }

    #[test]
    fn list_applies_order_predicate_and_paging() {
        let gateway = MemoryGateway::new();
        for name in ["carol", "alice", "bob", "alina"] {
            gateway.insert("people", &record(name)).unwrap();
        }

        let query = ListQuery::filtered(Predicate::contains(&["name"], "AL"))
            .order_by(OrderBy::asc("name"));
        let names: Vec<_> = gateway
            .list("people", &query)
            .unwrap()
            .into_iter()
            .map(|row| row.column("name"))
            .collect();
        assert_eq!(names, vec![FieldValue::text("alice"), FieldValue::text("alina")]);

        let page = ListQuery {
            limit: Some(2),
            offset: 1,
            ..ListQuery::default()
        };
        let ids: Vec<_> = gateway
            .list("people", &page)
            .unwrap()
            .into_iter()
            .map(|row| row.id.get())
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn update_missing_row_returns_none_and_meta_columns_are_rejected() {
        let gateway = MemoryGateway::new();
        let inserted = gateway.insert("people", &record("a")).unwrap();
        let missing = crate::model::EntityId::new(99).unwrap();
        assert!(gateway.update("people", missing, &record("x")).unwrap().is_none());

        let mut bad = Record::new();
        bad.insert("id".to_string(), FieldValue::Integer(5));
        assert!(gateway.update("people", inserted.id, &bad).is_err());
    }

    #[test]
    fn unknown_table_lists_empty() {
        let gateway = MemoryGateway::new();
        assert!(gateway.list("nothing", &ListQuery::default()).unwrap().is_empty());
        assert_eq!(gateway.count("nothing", None).unwrap(), 0);
    }
}
