//! Repository layer abstractions and gateway-backed implementation.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate storage backend details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must enforce entity validation before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `AlreadyPersisted`)
//!   in addition to storage transport errors.

pub mod entity_repo;

pub use entity_repo::{EntityRepository, GatewayRepository, RepoError, RepoResult};
