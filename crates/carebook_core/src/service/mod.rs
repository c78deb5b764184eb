//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Compute aggregates (statistics, distributions, groupings) over
//!   repository snapshots.
//!
//! # Invariants
//! - Services never bypass repository validation/persistence contracts.
//! - Every error leaving a service names the operation that produced it.

use crate::model::EntityError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod entity_service;
pub mod patient_service;
pub mod task_service;

pub use entity_service::{BulkCreateReport, BulkFailure, EntityService};
pub use patient_service::{AgeSummary, PatientService, PatientStatistics, PatientSummary};
pub use task_service::{TaskFilter, TaskService, TaskStatistics};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Underlying cause of a [`ServiceError`].
#[derive(Debug)]
pub enum ServiceErrorKind {
    /// Repository, validation or storage failure, unchanged.
    Repo(RepoError),
    /// Caller-supplied arguments are inconsistent (e.g. `min > max`).
    InvalidArgument(String),
}

/// Service failure tagged with the operation name.
#[derive(Debug)]
pub struct ServiceError {
    operation: &'static str,
    kind: ServiceErrorKind,
}

impl ServiceError {
    pub fn new(operation: &'static str, kind: ServiceErrorKind) -> Self {
        Self { operation, kind }
    }

    pub fn invalid_argument(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(operation, ServiceErrorKind::InvalidArgument(message.into()))
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn kind(&self) -> &ServiceErrorKind {
        &self.kind
    }

    /// Repository error behind this failure, if any.
    pub fn repo_error(&self) -> Option<&RepoError> {
        match &self.kind {
            ServiceErrorKind::Repo(err) => Some(err),
            ServiceErrorKind::InvalidArgument(_) => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.repo_error(), Some(RepoError::Validation(_)))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.repo_error(), Some(RepoError::NotFound { .. }))
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ServiceErrorKind::Repo(err) => write!(f, "{} failed: {err}", self.operation),
            ServiceErrorKind::InvalidArgument(message) => {
                write!(f, "{} failed: invalid argument: {message}", self.operation)
            }
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            ServiceErrorKind::Repo(err) => Some(err),
            ServiceErrorKind::InvalidArgument(_) => None,
        }
    }
}

/// Attaches an operation name to repository-level results.
pub(crate) trait OperationContext<T> {
    fn context(self, operation: &'static str) -> ServiceResult<T>;
}

impl<T> OperationContext<T> for Result<T, RepoError> {
    fn context(self, operation: &'static str) -> ServiceResult<T> {
        self.map_err(|err| ServiceError::new(operation, ServiceErrorKind::Repo(err)))
    }
}

impl<T> OperationContext<T> for Result<T, EntityError> {
    fn context(self, operation: &'static str) -> ServiceResult<T> {
        self.map_err(RepoError::from).context(operation)
    }
}

/// Rounds to one decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::{round1, OperationContext, ServiceErrorKind};
    use crate::model::EntityError;
    use std::error::Error;

    #[test]
    fn context_keeps_source_and_operation() {
        let result: Result<(), EntityError> = Err(EntityError::InvalidEntityData {
            kind: "patient",
            field: "gender",
        });
        let err = result.context("create_patient").unwrap_err();
        assert_eq!(err.operation(), "create_patient");
        assert!(err.is_validation());
        assert!(matches!(err.kind(), ServiceErrorKind::Repo(_)));
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("create_patient failed"));
    }

    #[test]
    fn round1_rounds_half_away_from_zero() {
        assert_eq!(round1(33.25), 33.3);
        assert_eq!(round1(40.0), 40.0);
    }
}
