//! Core entity persistence and validation for carebook.
//! This crate is the single source of truth for record invariants.

pub mod config;
pub mod db;
pub mod factory;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;
pub mod validate;

pub use crate::config::{ConfigError, CoreConfig, DatabaseLocation};
pub use db::{open_db, open_db_at, open_db_in_memory, DbError, DbResult};
pub use factory::{
    factory_registry, AnyEntity, FactoryError, FactoryRegistry, FactoryResult, ModelFactory,
    PatientFactory, TaskFactory,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::{
    AgeGroup, Entity, EntityError, EntityId, EntityMeta, NewPatient, NewTask, Patient,
    PatientChanges, Task, TaskChanges, TaskPriority, TaskStatus,
};
pub use repo::{EntityRepository, GatewayRepository, RepoError, RepoResult};
pub use service::{
    BulkCreateReport, BulkFailure, EntityService, PatientService, PatientStatistics,
    ServiceError, ServiceErrorKind, ServiceResult, TaskFilter, TaskService, TaskStatistics,
};
pub use storage::{
    FieldValue, ListQuery, MemoryGateway, OrderBy, Predicate, Record, SqliteGateway,
    StorageError, StorageGateway, StorageResult, StoredRow,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_matches_package() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
        assert!(core_version().split('.').count() >= 3);
    }
}
