//! Repository layer: the activity store.
//!
//! # Responsibility
//! - Define the storage contract the dependency engine consumes.
//! - Isolate SQLite query details from validation and orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Activity::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod activity_repo;
