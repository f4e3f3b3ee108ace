//! Activity use-case service.
//!
//! # Responsibility
//! - Provide the create/update/get/list/delete entry points for callers.
//! - Run dependency resolution and persistence in one store write scope.
//!
//! # Invariants
//! - Every mutation goes through `DependencyResolver` first.
//! - A rejected request leaves the store untouched.
//! - Log events carry ids and error codes only, never names or descriptions.

use crate::graph::error::{DependencyError, ResolveError};
use crate::model::activity::{
    ActivityDetail, ActivityId, ActivityLookup, ActivityPatch, ActivityStatus,
    ActivityValidationError, NewActivity,
};
use crate::repo::activity_repo::{
    ActivityListQuery, ActivityStore, DependencyChange, RepoError,
};
use crate::service::dependency_service::DependencyResolver;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from activity use-cases.
#[derive(Debug)]
pub enum ActivityServiceError {
    /// Dependency graph rejected the request.
    Rejected(DependencyError),
    /// Field validation rejected the request.
    Invalid(ActivityValidationError),
    /// Target activity does not exist.
    NotFound(ActivityId),
    /// Create request reused the id of a stored activity.
    AlreadyExists(ActivityId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl ActivityServiceError {
    /// Whether the caller sent invalid input (400-equivalent).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Rejected(_) | Self::Invalid(_) | Self::AlreadyExists(_)
        )
    }
}

impl Display for ActivityServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(err) => write!(f, "{err}"),
            Self::Invalid(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "activity not found: {id}"),
            Self::AlreadyExists(id) => write!(f, "activity already exists: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ActivityServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected(err) => Some(err),
            Self::Invalid(err) => Some(err),
            Self::NotFound(_) | Self::AlreadyExists(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ResolveError> for ActivityServiceError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::Rejected(err) => Self::Rejected(err),
            ResolveError::Invalid(err) => Self::Invalid(err),
            ResolveError::NotFound(id) => Self::NotFound(id),
            ResolveError::AlreadyExists(id) => Self::AlreadyExists(id),
            ResolveError::Store(err) => Self::Repo(err),
        }
    }
}

impl From<RepoError> for ActivityServiceError {
    fn from(value: RepoError) -> Self {
        ResolveError::from(value).into()
    }
}

pub type ServiceResult<T> = Result<T, ActivityServiceError>;

/// Activity service facade.
pub struct ActivityService<S: ActivityStore> {
    store: S,
}

impl<S: ActivityStore> ActivityService<S> {
    /// Creates a service using the provided store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validates and inserts one activity with its prerequisites.
    pub fn create_activity(&self, candidate: &NewActivity) -> ServiceResult<ActivityDetail> {
        let started_at = Instant::now();
        let result = self.store.write_atomically(|store| -> ServiceResult<ActivityDetail> {
            let resolved = DependencyResolver::new(store).prepare_create(candidate)?;
            let dependencies = resolved.prerequisite_ids();
            let activity = store.insert_activity(&resolved.activity, &dependencies)?;
            Ok(ActivityDetail {
                activity,
                dependencies,
            })
        });
        log_write("activity_create", started_at, &result);
        result
    }

    /// Validates and applies a partial update.
    ///
    /// Without `patch.dependencies` only scalar fields change, and existing
    /// edges are not re-checked against the new interval.
    pub fn update_activity(
        &self,
        activity_id: ActivityId,
        patch: &ActivityPatch,
    ) -> ServiceResult<ActivityDetail> {
        let started_at = Instant::now();
        let result = self.store.write_atomically(|store| -> ServiceResult<ActivityDetail> {
            let resolved = DependencyResolver::new(store).prepare_update(activity_id, patch)?;
            let write = resolved.into_write();
            let activity = store.persist(&write)?;
            let dependencies = match write.dependencies {
                DependencyChange::Replace(ids) => ids,
                DependencyChange::Unchanged => store.edges_of(activity_id)?,
            };
            Ok(ActivityDetail {
                activity,
                dependencies,
            })
        });
        log_write("activity_update", started_at, &result);
        result
    }

    /// Loads one activity with its prerequisite ids.
    pub fn get_activity(&self, activity_id: ActivityId) -> ServiceResult<ActivityDetail> {
        let activity = self
            .store
            .find_by_id(activity_id)?
            .ok_or(ActivityServiceError::NotFound(activity_id))?;
        let dependencies = self.store.edges_of(activity_id)?;
        Ok(ActivityDetail {
            activity,
            dependencies,
        })
    }

    /// Lists activities by display order.
    pub fn list_activities(&self, query: &ActivityListQuery) -> ServiceResult<Vec<ActivityDetail>> {
        Ok(self.store.list_activities(query)?)
    }

    /// Lists every activity in one status.
    pub fn list_by_status(&self, status: ActivityStatus) -> ServiceResult<Vec<ActivityDetail>> {
        self.list_activities(&ActivityListQuery {
            status: Some(status),
            ..ActivityListQuery::default()
        })
    }

    /// Lists `(id, name)` picker rows, skipping `excluded_ids`.
    pub fn list_lookups(&self, excluded_ids: &[ActivityId]) -> ServiceResult<Vec<ActivityLookup>> {
        Ok(self.store.list_lookups(excluded_ids)?)
    }

    /// Ids of activities that depend on `activity_id`.
    pub fn list_dependents(&self, activity_id: ActivityId) -> ServiceResult<Vec<ActivityId>> {
        if self.store.find_by_id(activity_id)?.is_none() {
            return Err(ActivityServiceError::NotFound(activity_id));
        }
        Ok(self.store.dependents_of(activity_id)?)
    }

    /// Deletes one activity; its edges go with it.
    pub fn delete_activity(&self, activity_id: ActivityId) -> ServiceResult<()> {
        let started_at = Instant::now();
        let result = self
            .store
            .delete_activity(activity_id)
            .map_err(ActivityServiceError::from);
        match &result {
            Ok(()) => info!(
                "event=activity_delete module=service status=ok activity_id={activity_id} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=activity_delete module=service status=error activity_id={activity_id} error={err}"
            ),
        }
        result
    }
}

fn log_write(event: &'static str, started_at: Instant, result: &ServiceResult<ActivityDetail>) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(detail) => info!(
            "event={event} module=service status=ok activity_id={} dependencies={} duration_ms={duration_ms}",
            detail.activity.id,
            detail.dependencies.len()
        ),
        Err(ActivityServiceError::Rejected(err)) => warn!(
            "event=dependency_rejected module=service status=rejected op={event} reason={} duration_ms={duration_ms}",
            err.code()
        ),
        Err(ActivityServiceError::Invalid(_)) => warn!(
            "event=dependency_rejected module=service status=rejected op={event} reason=invalid_field duration_ms={duration_ms}"
        ),
        Err(ActivityServiceError::AlreadyExists(id)) => warn!(
            "event={event} module=service status=rejected error_code=already_exists activity_id={id}"
        ),
        Err(ActivityServiceError::NotFound(id)) => warn!(
            "event={event} module=service status=error error_code=not_found activity_id={id}"
        ),
        Err(ActivityServiceError::Repo(err)) if err.is_busy() => warn!(
            "event={event} module=service status=error error_code=store_busy duration_ms={duration_ms}"
        ),
        Err(ActivityServiceError::Repo(err)) => error!(
            "event={event} module=service status=error error_code=store_failed error={err}"
        ),
    }
}
