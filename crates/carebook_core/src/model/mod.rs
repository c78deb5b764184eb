//! Domain entities and their shared capability interface.
//!
//! # Responsibility
//! - Define canonical record types used by core business logic.
//! - Keep the field -> validator mapping explicit per entity type.
//!
//! # Invariants
//! - Every entity value in memory has passed `Entity::validate()`.
//! - Identity (`EntityId`) is assigned by storage, never by callers.

pub mod entity;
pub mod patient;
pub mod task;

pub use entity::{validate_record, Entity, EntityError, EntityId, EntityMeta, InvalidEntityId};
pub use patient::{AgeGroup, NewPatient, Patient, PatientChanges, ADULT_AGE, GENDERS};
pub use task::{
    NewTask, Task, TaskChanges, TaskPriority, TaskStatus, TASK_PRIORITIES, TASK_STATUSES,
};
