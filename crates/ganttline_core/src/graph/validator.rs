//! Graph checks for proposed prerequisite edges.
//!
//! # Responsibility
//! - Decide whether a candidate prerequisite list keeps the dependency graph
//!   free of self-loops and cycles and honours finish-to-start ordering.
//! - Never mutate anything; store access is read-only.
//!
//! # Invariants
//! - Traversal state is created per call and per root; nothing is shared
//!   between validations.
//! - Traversal is iterative, so graph depth never grows the call stack.
//! - Reported order follows the order ids were supplied in.

use crate::graph::error::{DependencyError, ResolveError};
use crate::model::activity::{Activity, ActivityId};
use crate::repo::activity_repo::{dedupe, ActivityStore, EdgeLookup, RepoResult};
use std::collections::{HashMap, HashSet};

/// Fails when `activity_id` lists itself as a prerequisite.
pub fn validate_no_self_reference(
    activity_id: ActivityId,
    prerequisite_ids: &[ActivityId],
) -> Result<(), DependencyError> {
    if prerequisite_ids.contains(&activity_id) {
        return Err(DependencyError::SelfReference(activity_id));
    }
    Ok(())
}

/// Loads every prerequisite with one batched store call.
///
/// Returns activities in supplied order with duplicates collapsed. Reports
/// every missing id, not only the first.
pub fn resolve_prerequisites<S>(
    store: &S,
    prerequisite_ids: &[ActivityId],
) -> Result<Vec<Activity>, ResolveError>
where
    S: ActivityStore + ?Sized,
{
    let requested = dedupe(prerequisite_ids);
    let mut found: HashMap<ActivityId, Activity> = store
        .find_by_ids(&requested)?
        .into_iter()
        .map(|activity| (activity.id, activity))
        .collect();

    let missing_ids: Vec<ActivityId> = requested
        .iter()
        .copied()
        .filter(|id| !found.contains_key(id))
        .collect();
    if !missing_ids.is_empty() {
        return Err(DependencyError::MissingDependency { missing_ids }.into());
    }

    Ok(requested
        .iter()
        .filter_map(|id| found.remove(id))
        .collect())
}

/// Requires `candidate_start >= P.end` for every prerequisite `P`.
///
/// Reports the first violating prerequisite in the order given.
pub fn check_temporal_order(
    activity_name: &str,
    candidate_start: i64,
    prerequisites: &[Activity],
) -> Result<(), DependencyError> {
    match prerequisites
        .iter()
        .find(|prerequisite| candidate_start < prerequisite.end)
    {
        Some(prerequisite) => Err(DependencyError::TemporalViolation {
            activity_name: activity_name.to_string(),
            start: candidate_start,
            prerequisite_id: prerequisite.id,
            prerequisite_name: prerequisite.name.clone(),
            prerequisite_end: prerequisite.end,
        }),
        None => Ok(()),
    }
}

/// Fails when making `prerequisite_ids` the prerequisites of `activity_id`
/// would close a cycle.
///
/// Walks depth-first from each direct prerequisite along stored edges. The
/// walk fails when it reaches `activity_id`, or a node already on the current
/// path. Shared ancestors (diamonds) are fine.
pub fn detect_cycle<L>(
    activity_id: ActivityId,
    prerequisite_ids: &[ActivityId],
    edges: &L,
) -> Result<(), ResolveError>
where
    L: EdgeLookup + ?Sized,
{
    for &root in prerequisite_ids {
        if let Some(path) = walk_from(activity_id, root, edges)? {
            return Err(DependencyError::Cycle { activity_id, path }.into());
        }
    }
    Ok(())
}

struct Frame {
    id: ActivityId,
    children: Vec<ActivityId>,
    next: usize,
}

/// Returns the closing path if a walk from `root` reaches `target` or loops.
fn walk_from<L>(
    target: ActivityId,
    root: ActivityId,
    edges: &L,
) -> RepoResult<Option<Vec<ActivityId>>>
where
    L: EdgeLookup + ?Sized,
{
    if root == target {
        return Ok(Some(vec![target, target]));
    }

    let mut visited = HashSet::from([root]);
    let mut on_path = HashSet::from([root]);
    let mut stack = vec![Frame {
        id: root,
        children: edges.edges_of(root)?,
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let child = match frame.children.get(frame.next).copied() {
            Some(child) => {
                frame.next += 1;
                child
            }
            None => {
                on_path.remove(&frame.id);
                stack.pop();
                continue;
            }
        };

        if child == target {
            let mut path = vec![target];
            path.extend(stack.iter().map(|frame| frame.id));
            path.push(target);
            return Ok(Some(path));
        }
        if on_path.contains(&child) {
            let mut path: Vec<ActivityId> = stack
                .iter()
                .map(|frame| frame.id)
                .skip_while(|id| *id != child)
                .collect();
            path.push(child);
            return Ok(Some(path));
        }
        if !visited.insert(child) {
            continue;
        }

        on_path.insert(child);
        stack.push(Frame {
            id: child,
            children: edges.edges_of(child)?,
            next: 0,
        });
    }

    Ok(None)
}
