//! Storage gateway boundary.
//!
//! # Responsibility
//! - Define the row/predicate vocabulary shared by every backend.
//! - Define the `StorageGateway` contract consumed by repositories.
//!
//! # Invariants
//! - Identifiers are assigned by the backend on insert and never reused.
//! - Every gateway call is atomic on its own; callers get no cross-call
//!   isolation and no arbitration of racing writes.
//! - Listing without explicit ordering returns rows by ascending id; explicit
//!   ordering always falls back to ascending id for ties.
//! - `updated_at` never moves backwards for a row.

use crate::db::DbError;
use crate::model::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;
mod sqlite;

pub use memory::MemoryGateway;
pub use sqlite::SqliteGateway;

/// Columns owned by the gateway itself; never writable through a `Record`.
pub const META_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

pub type StorageResult<T> = Result<T, StorageError>;

/// Scalar value of one stored field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Total order used for listing: `Null < Integer < Text`, text compared
    /// ASCII case-insensitively (mirrors SQLite `COLLATE NOCASE`).
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Integer(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Integer(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => {
                a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Field name -> value mapping for one row, excluding gateway-owned columns.
pub type Record = BTreeMap<String, FieldValue>;

/// One persisted row as returned by a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub id: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fields: Record,
}

impl StoredRow {
    /// Reads a column, including the gateway-owned ones.
    ///
    /// Timestamps are exposed as epoch milliseconds; missing fields as `Null`.
    pub fn column(&self, name: &str) -> FieldValue {
        match name {
            "id" => FieldValue::Integer(self.id.get()),
            "created_at" => FieldValue::Integer(self.created_at.timestamp_millis()),
            "updated_at" => FieldValue::Integer(self.updated_at.timestamp_millis()),
            other => self.fields.get(other).cloned().unwrap_or(FieldValue::Null),
        }
    }
}

/// Result of a successful insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    pub id: EntityId,
    pub created_at: DateTime<Utc>,
}

/// Filter expression applied while listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Exact equality; `Null` matches missing/NULL values.
    Equals {
        column: &'static str,
        value: FieldValue,
    },
    /// ASCII case-insensitive text equality.
    EqualsIgnoreCase { column: &'static str, value: String },
    /// ASCII case-insensitive substring match on any of `columns`.
    Contains {
        columns: Vec<&'static str>,
        needle: String,
    },
    /// Integer column `>=` bound.
    AtLeast { column: &'static str, value: i64 },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn equals(column: &'static str, value: impl Into<FieldValue>) -> Self {
        Self::Equals {
            column,
            value: value.into(),
        }
    }

    pub fn eq_ignore_case(column: &'static str, value: impl Into<String>) -> Self {
        Self::EqualsIgnoreCase {
            column,
            value: value.into(),
        }
    }

    pub fn contains(columns: &[&'static str], needle: impl Into<String>) -> Self {
        Self::Contains {
            columns: columns.to_vec(),
            needle: needle.into(),
        }
    }

    pub fn at_least(column: &'static str, value: i64) -> Self {
        Self::AtLeast { column, value }
    }

    /// Evaluates this predicate against one row in memory.
    pub fn matches(&self, row: &StoredRow) -> bool {
        match self {
            Self::Equals { column, value } => row.column(column) == *value,
            Self::EqualsIgnoreCase { column, value } => row
                .column(column)
                .as_text()
                .is_some_and(|text| text.eq_ignore_ascii_case(value)),
            Self::Contains { columns, needle } => {
                let needle = needle.to_ascii_lowercase();
                columns.iter().any(|column| {
                    row.column(column)
                        .as_text()
                        .is_some_and(|text| text.to_ascii_lowercase().contains(&needle))
                })
            }
            Self::AtLeast { column, value } => row
                .column(column)
                .as_integer()
                .is_some_and(|current| current >= *value),
            Self::All(items) => items.iter().all(|item| item.matches(row)),
            Self::Any(items) => items.iter().any(|item| item.matches(row)),
        }
    }

    /// Every column referenced by this predicate.
    pub fn columns(&self) -> Vec<&'static str> {
        match self {
            Self::Equals { column, .. }
            | Self::EqualsIgnoreCase { column, .. }
            | Self::AtLeast { column, .. } => vec![*column],
            Self::Contains { columns, .. } => columns.clone(),
            Self::All(items) | Self::Any(items) => {
                items.iter().flat_map(Predicate::columns).collect()
            }
        }
    }
}

/// One ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: &'static str) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub fn desc(column: &'static str) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// Query options for listing rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub predicate: Option<Predicate>,
    /// Empty means ascending id.
    pub order: Vec<OrderBy>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ListQuery {
    pub fn filtered(predicate: Predicate) -> Self {
        Self {
            predicate: Some(predicate),
            ..Self::default()
        }
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }
}

/// Compares two rows by the requested ordering, then ascending id.
pub fn compare_rows(order: &[OrderBy], left: &StoredRow, right: &StoredRow) -> Ordering {
    for key in order {
        let ordering = left.column(key.column).sort_cmp(&right.column(key.column));
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.id.cmp(&right.id)
}

/// Boundary abstraction over the persistent store.
pub trait StorageGateway {
    /// Inserts one row and returns the assigned id and creation time.
    fn insert(&self, table: &str, fields: &Record) -> StorageResult<Inserted>;
    /// Gets one row by id.
    fn get(&self, table: &str, id: EntityId) -> StorageResult<Option<StoredRow>>;
    /// Lists matching rows as a snapshot.
    fn list(&self, table: &str, query: &ListQuery) -> StorageResult<Vec<StoredRow>>;
    /// Writes the given fields; returns the new `updated_at`, `None` if absent.
    fn update(
        &self,
        table: &str,
        id: EntityId,
        changed: &Record,
    ) -> StorageResult<Option<DateTime<Utc>>>;
    /// Removes one row; returns whether it existed.
    fn delete(&self, table: &str, id: EntityId) -> StorageResult<bool>;
    /// Counts matching rows.
    fn count(&self, table: &str, predicate: Option<&Predicate>) -> StorageResult<u64>;
}

impl<G: StorageGateway + ?Sized> StorageGateway for &G {
    fn insert(&self, table: &str, fields: &Record) -> StorageResult<Inserted> {
        (**self).insert(table, fields)
    }

    fn get(&self, table: &str, id: EntityId) -> StorageResult<Option<StoredRow>> {
        (**self).get(table, id)
    }

    fn list(&self, table: &str, query: &ListQuery) -> StorageResult<Vec<StoredRow>> {
        (**self).list(table, query)
    }

    fn update(
        &self,
        table: &str,
        id: EntityId,
        changed: &Record,
    ) -> StorageResult<Option<DateTime<Utc>>> {
        (**self).update(table, id, changed)
    }

    fn delete(&self, table: &str, id: EntityId) -> StorageResult<bool> {
        (**self).delete(table, id)
    }

    fn count(&self, table: &str, predicate: Option<&Predicate>) -> StorageResult<u64> {
        (**self).count(table, predicate)
    }
}

/// Failure surfaced by a storage backend.
#[derive(Debug)]
pub enum StorageError {
    Sqlite(rusqlite::Error),
    Db(DbError),
    /// In-memory table lock was poisoned by a panicking writer.
    LockPoisoned,
    /// Table or column name is not a plain identifier, or is gateway-owned.
    InvalidIdentifier(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be decoded into a row.
    InvalidData(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::LockPoisoned => write!(f, "in-memory storage lock poisoned"),
            Self::InvalidIdentifier(value) => write!(f, "invalid storage identifier `{value}`"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "storage requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "storage requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid stored row: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Current time truncated to milliseconds, the precision every backend keeps.
pub(crate) fn now_millis() -> DateTime<Utc> {
    let millis = Utc::now().timestamp_millis();
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

/// Rejects names that are not plain SQL identifiers.
pub(crate) fn ensure_identifier(name: &str) -> StorageResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidIdentifier(name.to_string()))
    }
}

/// Rejects record keys that are not identifiers or that target meta columns.
pub(crate) fn ensure_writable_fields(fields: &Record) -> StorageResult<()> {
    for name in fields.keys() {
        ensure_identifier(name)?;
        if META_COLUMNS.contains(&name.as_str()) {
            return Err(StorageError::InvalidIdentifier(name.clone()));
        }
    }
    Ok(())
}
