//! Entity capability interface shared by every persisted record type.
//!
//! # Responsibility
//! - Define identity/timestamp metadata (`EntityId`, `EntityMeta`).
//! - Define the `Entity` contract: validation and record mapping.
//!
//! # Invariants
//! - `EntityId` is always strictly positive.
//! - `id == None` means "not persisted"; storage assigns ids on insert.
//! - `with_changes` never mutates the receiver.

use crate::storage::{FieldValue, Record};
use crate::validate::FieldSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned identifier; `id <= 0` is never valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct EntityId(i64);

impl EntityId {
    pub fn new(value: i64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw id value rejected by [`EntityId::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidEntityId(pub i64);

impl Display for InvalidEntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity id must be positive, got {}", self.0)
    }
}

impl Error for InvalidEntityId {}

impl TryFrom<i64> for EntityId {
    type Error = InvalidEntityId;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidEntityId(value))
    }
}

impl From<EntityId> for i64 {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

/// Identity and timestamp metadata owned by storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: Option<EntityId>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Field-level or whole-entity validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    /// Construction (or decoding) rejected; `field` is the first invalid one.
    InvalidEntityData {
        kind: &'static str,
        field: &'static str,
    },
    /// Single-field mutation rejected; prior value is kept.
    InvalidFieldValue {
        kind: &'static str,
        field: &'static str,
    },
    /// Change set names a field outside the entity mapping.
    UnknownField { kind: &'static str, field: String },
}

impl EntityError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            Self::InvalidEntityData { field, .. } | Self::InvalidFieldValue { field, .. } => *field,
            Self::UnknownField { field, .. } => field.as_str(),
        }
    }
}

impl Display for EntityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEntityData { kind, field } => {
                write!(f, "invalid {kind} data: field `{field}` failed validation")
            }
            Self::InvalidFieldValue { kind, field } => {
                write!(f, "invalid value for {kind}.{field}")
            }
            Self::UnknownField { kind, field } => write!(f, "unknown {kind} field `{field}`"),
        }
    }
}

impl Error for EntityError {}

/// Capability interface implemented by each persisted record type.
///
/// The field mapping is explicit configuration (`fields()`), never derived by
/// reflection: it names every column together with its validator.
pub trait Entity: Clone + Sized {
    /// Human-readable entity kind, used in errors and logs.
    const KIND: &'static str;
    /// Storage table / collection name.
    const TABLE: &'static str;

    /// Field name -> validator table.
    fn fields() -> &'static [FieldSpec];
    fn meta(&self) -> &EntityMeta;
    fn meta_mut(&mut self) -> &mut EntityMeta;
    /// Converts domain fields to a storage record (no meta columns).
    fn to_record(&self) -> Record;
    /// Builds a validated entity from metadata and a storage record.
    fn from_record(meta: EntityMeta, record: &Record) -> Result<Self, EntityError>;

    fn id(&self) -> Option<EntityId> {
        self.meta().id
    }

    fn is_persisted(&self) -> bool {
        self.meta().id.is_some()
    }

    fn field_spec(name: &str) -> Option<&'static FieldSpec> {
        Self::fields().iter().find(|spec| spec.name == name)
    }

    /// Runs every field validator; reports the first failing field.
    fn validate(&self) -> Result<(), EntityError> {
        validate_record::<Self>(&self.to_record())
    }

    /// Returns a copy with `changes` applied.
    ///
    /// Each changed field is checked against its own validator first
    /// (`InvalidFieldValue` / `UnknownField`); the result is then rebuilt
    /// through `from_record`, so cross-field rules still apply.
    fn with_changes(&self, changes: &Record) -> Result<Self, EntityError> {
        let mut merged = self.to_record();
        for (name, value) in changes {
            let spec = Self::field_spec(name).ok_or_else(|| EntityError::UnknownField {
                kind: Self::KIND,
                field: name.clone(),
            })?;
            if !spec.accepts(value) {
                return Err(EntityError::InvalidFieldValue {
                    kind: Self::KIND,
                    field: spec.name,
                });
            }
            merged.insert(name.clone(), value.clone());
        }
        Self::from_record(self.meta().clone(), &merged)
    }
}

/// Checks a full record against `E::fields()`.
pub fn validate_record<E: Entity>(record: &Record) -> Result<(), EntityError> {
    for spec in E::fields() {
        let value = record.get(spec.name).unwrap_or(&FieldValue::Null);
        if !spec.accepts(value) {
            return Err(EntityError::InvalidEntityData {
                kind: E::KIND,
                field: spec.name,
            });
        }
    }
    Ok(())
}

/// Reads a required text field for `from_record` implementations.
pub(crate) fn required_text(
    record: &Record,
    kind: &'static str,
    field: &'static str,
) -> Result<String, EntityError> {
    record
        .get(field)
        .and_then(FieldValue::as_text)
        .map(str::to_string)
        .ok_or(EntityError::InvalidEntityData { kind, field })
}

/// Reads an optional text field; `Null`/missing map to `None`.
pub(crate) fn optional_text(
    record: &Record,
    kind: &'static str,
    field: &'static str,
) -> Result<Option<String>, EntityError> {
    match record.get(field) {
        None | Some(FieldValue::Null) => Ok(None),
        Some(FieldValue::Text(value)) => Ok(Some(value.clone())),
        Some(FieldValue::Integer(_)) => Err(EntityError::InvalidEntityData { kind, field }),
    }
}

/// Reads an optional epoch-millisecond timestamp.
pub(crate) fn optional_timestamp(
    record: &Record,
    kind: &'static str,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, EntityError> {
    match record.get(field) {
        None | Some(FieldValue::Null) => Ok(None),
        Some(FieldValue::Integer(millis)) => DateTime::<Utc>::from_timestamp_millis(*millis)
            .map(Some)
            .ok_or(EntityError::InvalidEntityData { kind, field }),
        Some(FieldValue::Text(_)) => Err(EntityError::InvalidEntityData { kind, field }),
    }
}

/// Trims and drops empty optional text.
pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
