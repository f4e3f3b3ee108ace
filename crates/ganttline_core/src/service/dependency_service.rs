//! Dependency resolution for activity create/update requests.
//!
//! # Responsibility
//! - Run the graph checks against the store and produce a prerequisite set
//!   that is safe to persist, or a typed rejection.
//! - Merge update patches with stored values before validating intervals.
//!
//! # Invariants
//! - Nothing is written here; callers persist the returned payload.
//! - Check order: interval, (explicit create id) existence, self-reference,
//!   missing ids, temporal order, cycle.
//! - An update without a dependency list never touches edges and never runs
//!   dependency checks; an explicit empty list clears edges.

use crate::graph::error::ResolveError;
use crate::graph::validator::{
    check_temporal_order, detect_cycle, resolve_prerequisites, validate_no_self_reference,
};
use crate::model::activity::{validate_interval, Activity, ActivityId, ActivityPatch, NewActivity};
use crate::repo::activity_repo::{ActivityStore, ActivityWrite, DependencyChange};

/// Create request that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCreate {
    /// Record to insert, defaults applied.
    pub activity: Activity,
    /// Prerequisites in supplied order, duplicates collapsed.
    pub prerequisites: Vec<Activity>,
}

impl ResolvedCreate {
    pub fn prerequisite_ids(&self) -> Vec<ActivityId> {
        self.prerequisites.iter().map(|activity| activity.id).collect()
    }
}

/// Update request that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUpdate {
    /// Stored record with the patch applied.
    pub activity: Activity,
    pub dependencies: DependencyChange,
    /// Resolved prerequisites; empty unless the patch replaced the list.
    pub prerequisites: Vec<Activity>,
}

impl ResolvedUpdate {
    pub fn into_write(self) -> ActivityWrite {
        ActivityWrite {
            activity: self.activity,
            dependencies: self.dependencies,
        }
    }
}

/// Stateless resolver over one store handle.
pub struct DependencyResolver<'s, S: ActivityStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: ActivityStore + ?Sized> DependencyResolver<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Validates a create request.
    ///
    /// A freshly generated id cannot appear in any stored edge, so the
    /// existence, cycle and self-reference checks only run when the caller
    /// supplied the id.
    pub fn prepare_create(&self, candidate: &NewActivity) -> Result<ResolvedCreate, ResolveError> {
        validate_interval(candidate.start, candidate.end)?;
        let activity = candidate.to_activity()?;

        let explicit_id = candidate.id.is_some();
        if explicit_id && self.store.find_by_id(activity.id)?.is_some() {
            return Err(ResolveError::AlreadyExists(activity.id));
        }

        if candidate.dependencies.is_empty() {
            return Ok(ResolvedCreate {
                activity,
                prerequisites: Vec::new(),
            });
        }

        if explicit_id {
            validate_no_self_reference(activity.id, &candidate.dependencies)?;
        }
        let prerequisites = resolve_prerequisites(self.store, &candidate.dependencies)?;
        check_temporal_order(&activity.name, activity.start, &prerequisites)?;
        if explicit_id {
            let prerequisite_ids: Vec<ActivityId> =
                prerequisites.iter().map(|activity| activity.id).collect();
            detect_cycle(activity.id, &prerequisite_ids, self.store)?;
        }

        Ok(ResolvedCreate {
            activity,
            prerequisites,
        })
    }

    /// Validates an update of the stored activity `activity_id`.
    pub fn prepare_update(
        &self,
        activity_id: ActivityId,
        patch: &ActivityPatch,
    ) -> Result<ResolvedUpdate, ResolveError> {
        let current = self
            .store
            .find_by_id(activity_id)?
            .ok_or(ResolveError::NotFound(activity_id))?;

        let (start, end) = patch.effective_interval(&current);
        validate_interval(start, end)?;
        let next = patch.apply_to(&current);
        next.validate()?;

        let Some(requested) = patch.dependencies.as_ref() else {
            return Ok(ResolvedUpdate {
                activity: next,
                dependencies: DependencyChange::Unchanged,
                prerequisites: Vec::new(),
            });
        };

        if requested.is_empty() {
            return Ok(ResolvedUpdate {
                activity: next,
                dependencies: DependencyChange::Replace(Vec::new()),
                prerequisites: Vec::new(),
            });
        }

        validate_no_self_reference(activity_id, requested)?;
        let prerequisites = resolve_prerequisites(self.store, requested)?;
        check_temporal_order(&next.name, next.start, &prerequisites)?;
        let prerequisite_ids: Vec<ActivityId> =
            prerequisites.iter().map(|activity| activity.id).collect();
        detect_cycle(activity_id, &prerequisite_ids, self.store)?;

        Ok(ResolvedUpdate {
            activity: next,
            dependencies: DependencyChange::Replace(prerequisite_ids),
            prerequisites,
        })
    }
}
