//! Core domain logic for Ganttline.
//! This crate is the single source of truth for activity scheduling
//! invariants: no self-loops, no cycles, finish-to-start ordering.

pub mod db;
pub mod graph;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use graph::{DependencyError, ResolveError};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LoggingError};
pub use model::activity::{
    Activity, ActivityDetail, ActivityId, ActivityLookup, ActivityPatch, ActivityStatus,
    ActivityType, ActivityValidationError, NewActivity,
};
pub use repo::activity_repo::{
    ActivityListQuery, ActivityStore, ActivityWrite, DependencyChange, EdgeLookup, RepoError,
    RepoResult, SqliteActivityRepository,
};
pub use service::activity_service::{ActivityService, ActivityServiceError, ServiceResult};
pub use service::dependency_service::{DependencyResolver, ResolvedCreate, ResolvedUpdate};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
