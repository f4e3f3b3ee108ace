//! Dependency graph validation.
//!
//! - [`validator`] holds the pure checks run against a proposed edge set.
//! - [`error`] defines the rejection taxonomy shared with the services.

pub mod error;
pub mod validator;

pub use error::{DependencyError, ResolveError};
pub use validator::{
    check_temporal_order, detect_cycle, resolve_prerequisites, validate_no_self_reference,
};
