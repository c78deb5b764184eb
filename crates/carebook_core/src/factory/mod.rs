//! Entity factories with business preconditions, plus a named registry.
//!
//! # Responsibility
//! - Construct entities under rules stronger than field validation
//!   (e.g. "patient must be an adult").
//! - Expose factories by name through a process-wide, read-only registry.
//!
//! # Invariants
//! - A precondition failure is reported as `Precondition`, never as a field
//!   validation error.
//! - Factories never touch storage.

use crate::model::{Entity, EntityError, Patient, Task};
use crate::storage::Record;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod patient_factory;
pub mod registry;
pub mod task_factory;

pub use patient_factory::PatientFactory;
pub use registry::{factory_registry, FactoryRegistry};
pub use task_factory::TaskFactory;

pub type FactoryResult<T> = Result<T, FactoryError>;

/// Factory and registry errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    /// Business rule beyond field validity does not hold.
    Precondition(String),
    /// Field validation failed while building the entity.
    Entity(EntityError),
    UnsupportedModel { factory: String, model: String },
    UnknownFactory(String),
    DuplicateFactory(String),
    InvalidFactoryName(String),
}

impl Display for FactoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Precondition(message) => write!(f, "precondition failed: {message}"),
            Self::Entity(err) => write!(f, "{err}"),
            Self::UnsupportedModel { factory, model } => {
                write!(f, "factory `{factory}` does not build `{model}`")
            }
            Self::UnknownFactory(name) => write!(f, "factory not found: {name}"),
            Self::DuplicateFactory(name) => write!(f, "factory already registered: {name}"),
            Self::InvalidFactoryName(name) => write!(f, "factory name is invalid: `{name}`"),
        }
    }
}

impl Error for FactoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Entity(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EntityError> for FactoryError {
    fn from(value: EntityError) -> Self {
        Self::Entity(value)
    }
}

/// Entity produced by a registry lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyEntity {
    Patient(Patient),
    Task(Task),
}

impl AnyEntity {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Patient(_) => Patient::KIND,
            Self::Task(_) => Task::KIND,
        }
    }

    pub fn into_patient(self) -> Option<Patient> {
        match self {
            Self::Patient(patient) => Some(patient),
            Self::Task(_) => None,
        }
    }

    pub fn into_task(self) -> Option<Task> {
        match self {
            Self::Task(task) => Some(task),
            Self::Patient(_) => None,
        }
    }
}

/// Named constructor for one or more model types.
pub trait ModelFactory: Send + Sync {
    /// Registry key.
    fn name(&self) -> &str;
    /// Model type names accepted by `create_model`.
    fn supported_models(&self) -> &'static [&'static str];
    /// Builds `model_type` from a field record.
    fn create_model(&self, model_type: &str, data: &Record) -> FactoryResult<AnyEntity>;
}

pub(crate) fn unsupported(factory: &str, model: &str) -> FactoryError {
    FactoryError::UnsupportedModel {
        factory: factory.to_string(),
        model: model.to_string(),
    }
}
