//! Domain model for schedulable activities.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep field validation next to the data it guards.
//!
//! # Invariants
//! - Every activity is identified by a stable `ActivityId`.
//! - Dependency edges are owned by the store, not by the activity record.

pub mod activity;
