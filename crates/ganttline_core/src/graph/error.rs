//! Rejection taxonomy for dependency graph mutations.
//!
//! # Responsibility
//! - Name every way a proposed activity/edge set can be refused.
//! - Carry the ids and names callers need for a precise message.
//!
//! # Invariants
//! - `DependencyError` only describes invalid caller input; it is never
//!   produced for store or transport failures.

use crate::model::activity::{ActivityId, ActivityValidationError};
use crate::repo::activity_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Deterministic rejection of a create/update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    /// `end` is not strictly after `start`.
    InvalidInterval { start: i64, end: i64 },
    /// The activity lists itself as a prerequisite.
    SelfReference(ActivityId),
    /// Referenced prerequisites do not exist, in the order supplied.
    MissingDependency { missing_ids: Vec<ActivityId> },
    /// The dependent would start before a prerequisite ends.
    TemporalViolation {
        activity_name: String,
        start: i64,
        prerequisite_id: ActivityId,
        prerequisite_name: String,
        prerequisite_end: i64,
    },
    /// The proposed edges close a cycle.
    ///
    /// `path` starts and ends on the same id.
    Cycle {
        activity_id: ActivityId,
        path: Vec<ActivityId>,
    },
}

impl DependencyError {
    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInterval { .. } => "invalid_interval",
            Self::SelfReference(_) => "self_reference",
            Self::MissingDependency { .. } => "missing_dependency",
            Self::TemporalViolation { .. } => "temporal_violation",
            Self::Cycle { .. } => "cycle",
        }
    }
}

impl Display for DependencyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInterval { start, end } => {
                write!(f, "end ({end}) must be after start ({start})")
            }
            Self::SelfReference(id) => write!(f, "activity {id} cannot depend on itself"),
            Self::MissingDependency { missing_ids } => {
                let ids = missing_ids
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "dependencies not found: {ids}")
            }
            Self::TemporalViolation {
                activity_name,
                start,
                prerequisite_name,
                prerequisite_end,
                ..
            } => write!(
                f,
                "`{activity_name}` starts at {start} before prerequisite `{prerequisite_name}` ends at {prerequisite_end}"
            ),
            Self::Cycle { activity_id, path } => {
                let path = path
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" -> ");
                write!(
                    f,
                    "dependencies of {activity_id} would create a cycle: {path}"
                )
            }
        }
    }
}

impl Error for DependencyError {}

/// Failure of a dependency resolution pass.
#[derive(Debug)]
pub enum ResolveError {
    /// Invalid caller input; surface verbatim.
    Rejected(DependencyError),
    /// Scalar fields failed validation.
    Invalid(ActivityValidationError),
    /// The activity being updated does not exist.
    NotFound(ActivityId),
    /// A create request named an id that is already taken.
    AlreadyExists(ActivityId),
    /// Store lookup failed; not a rejection.
    Store(RepoError),
}

impl ResolveError {
    /// Whether this error is a deterministic rejection of caller input.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Rejected(_) | Self::Invalid(_) | Self::AlreadyExists(_)
        )
    }
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(err) => write!(f, "{err}"),
            Self::Invalid(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "activity not found: {id}"),
            Self::AlreadyExists(id) => write!(f, "activity already exists: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected(err) => Some(err),
            Self::Invalid(err) => Some(err),
            Self::NotFound(_) | Self::AlreadyExists(_) => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<DependencyError> for ResolveError {
    fn from(value: DependencyError) -> Self {
        Self::Rejected(value)
    }
}

impl From<ActivityValidationError> for ResolveError {
    fn from(value: ActivityValidationError) -> Self {
        match value {
            ActivityValidationError::InvalidInterval { start, end } => {
                Self::Rejected(DependencyError::InvalidInterval { start, end })
            }
            other => Self::Invalid(other),
        }
    }
}

impl From<RepoError> for ResolveError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => err.into(),
            other => Self::Store(other),
        }
    }
}
