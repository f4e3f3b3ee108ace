mod common;

use common::{create, edge_count, jan, service, setup};
use ganttline_core::{
    ActivityPatch, ActivityServiceError, ActivityStore, DependencyChange, DependencyError,
    DependencyResolver, NewActivity, ResolveError, SqliteActivityRepository,
};
use uuid::Uuid;

fn rejection(err: ActivityServiceError) -> DependencyError {
    match err {
        ActivityServiceError::Rejected(err) => err,
        other => panic!("expected rejection, got {other}"),
    }
}

#[test]
fn create_rejects_when_any_prerequisite_ends_after_start() {
    let conn = setup();
    let service = service(&conn);
    let p = create(&service, "P", jan(1), jan(10), &[]);
    let q = create(&service, "Q", jan(5), jan(12), &[]);

    let err = service
        .create_activity(
            &NewActivity::new("R", jan(8), jan(20)).depends_on([p.activity.id, q.activity.id]),
        )
        .unwrap_err();

    match rejection(err) {
        DependencyError::TemporalViolation {
            activity_name,
            prerequisite_id,
            prerequisite_name,
            ..
        } => {
            assert_eq!(activity_name, "R");
            assert_eq!(prerequisite_id, q.activity.id);
            assert_eq!(prerequisite_name, "Q");
        }
        other => panic!("unexpected rejection: {other}"),
    }
    assert_eq!(service.list_lookups(&[]).unwrap().len(), 2);
}

#[test]
fn create_accepts_prerequisite_ending_exactly_at_start() {
    let conn = setup();
    let service = service(&conn);
    let p = create(&service, "P", jan(1), jan(10), &[]);

    let created = create(&service, "R", jan(10), jan(11), &[p.activity.id]);
    assert_eq!(created.dependencies, vec![p.activity.id]);
    assert_eq!(
        service.list_dependents(p.activity.id).unwrap(),
        vec![created.activity.id]
    );
}

#[test]
fn reversing_an_edge_in_place_fails_the_temporal_check_first() {
    let conn = setup();
    let service = service(&conn);
    let b = create(&service, "B", jan(1), jan(2), &[]);
    let a = create(&service, "A", jan(3), jan(4), &[b.activity.id]);

    // A starts after B ends, so B can never start after A ends while both
    // keep their intervals; ordering is checked before cycles.
    let err = service
        .update_activity(
            b.activity.id,
            &ActivityPatch {
                dependencies: Some(vec![a.activity.id]),
                ..ActivityPatch::default()
            },
        )
        .unwrap_err();
    match rejection(err) {
        DependencyError::TemporalViolation {
            activity_name,
            prerequisite_id,
            prerequisite_name,
            ..
        } => {
            assert_eq!(activity_name, "B");
            assert_eq!(prerequisite_id, a.activity.id);
            assert_eq!(prerequisite_name, "A");
        }
        other => panic!("unexpected rejection: {other}"),
    }
    assert!(service.get_activity(b.activity.id).unwrap().dependencies.is_empty());
}

#[test]
fn reversing_an_edge_after_moving_the_interval_is_a_cycle() {
    let conn = setup();
    let service = service(&conn);
    let b = create(&service, "B", jan(1), jan(2), &[]);
    let a = create(&service, "A", jan(3), jan(4), &[b.activity.id]);

    let err = service
        .update_activity(
            b.activity.id,
            &ActivityPatch {
                start: Some(jan(5)),
                end: Some(jan(6)),
                dependencies: Some(vec![a.activity.id]),
                ..ActivityPatch::default()
            },
        )
        .unwrap_err();
    match rejection(err) {
        DependencyError::Cycle { activity_id, path } => {
            assert_eq!(activity_id, b.activity.id);
            assert_eq!(path, vec![b.activity.id, a.activity.id, b.activity.id]);
        }
        other => panic!("unexpected rejection: {other}"),
    }

    let stored = service.get_activity(b.activity.id).unwrap();
    assert_eq!(stored.activity.start, jan(1));
    assert!(stored.dependencies.is_empty());
}

#[test]
fn resolver_reports_cycle_on_stored_graph() {
    let conn = setup();
    let repo = SqliteActivityRepository::try_new(&conn).unwrap();
    let a = repo
        .insert_activity(&ganttline_core::Activity::new("A", jan(1), jan(2)), &[])
        .unwrap();
    let b = repo
        .insert_activity(&ganttline_core::Activity::new("B", jan(1), jan(2)), &[a.id])
        .unwrap();
    let c = repo
        .insert_activity(&ganttline_core::Activity::new("C", jan(1), jan(2)), &[b.id])
        .unwrap();

    let resolver = DependencyResolver::new(&repo);
    let err = resolver
        .prepare_update(
            a.id,
            &ActivityPatch {
                start: Some(jan(3)),
                end: Some(jan(4)),
                dependencies: Some(vec![c.id]),
                ..ActivityPatch::default()
            },
        )
        .unwrap_err();
    match err {
        ResolveError::Rejected(DependencyError::Cycle { path, .. }) => {
            assert_eq!(path, vec![a.id, c.id, b.id, a.id]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn self_reference_is_rejected_before_lookup() {
    let conn = setup();
    let service = service(&conn);
    let a = create(&service, "A", jan(5), jan(6), &[]);
    let other = create(&service, "other", jan(1), jan(2), &[]);

    let err = service
        .update_activity(
            a.activity.id,
            &ActivityPatch {
                dependencies: Some(vec![other.activity.id, Uuid::new_v4(), a.activity.id]),
                ..ActivityPatch::default()
            },
        )
        .unwrap_err();
    assert_eq!(rejection(err), DependencyError::SelfReference(a.activity.id));
}

#[test]
fn missing_ids_are_all_reported_in_order() {
    let conn = setup();
    let service = service(&conn);
    let existing = create(&service, "exists", jan(1), jan(2), &[]);
    let first_missing = Uuid::new_v4();
    let third_missing = Uuid::new_v4();

    let err = service
        .create_activity(&NewActivity::new("new", jan(3), jan(4)).depends_on([
            first_missing,
            existing.activity.id,
            third_missing,
        ]))
        .unwrap_err();
    assert_eq!(
        rejection(err),
        DependencyError::MissingDependency {
            missing_ids: vec![first_missing, third_missing]
        }
    );
}

#[test]
fn diamond_dependencies_are_accepted() {
    let conn = setup();
    let service = service(&conn);
    let d = create(&service, "D", jan(1), jan(2), &[]);
    let b = create(&service, "B", jan(2), jan(3), &[d.activity.id]);
    let c = create(&service, "C", jan(2), jan(4), &[d.activity.id]);

    let a = create(&service, "A", jan(4), jan(5), &[b.activity.id, c.activity.id]);
    assert_eq!(a.dependencies, vec![b.activity.id, c.activity.id]);

    let rewired = service
        .update_activity(
            a.activity.id,
            &ActivityPatch {
                dependencies: Some(vec![c.activity.id, b.activity.id, d.activity.id]),
                ..ActivityPatch::default()
            },
        )
        .unwrap();
    assert_eq!(
        rewired.dependencies,
        vec![c.activity.id, b.activity.id, d.activity.id]
    );
}

#[test]
fn update_without_dependency_field_skips_graph_checks() {
    let conn = setup();
    let service = service(&conn);
    let p = create(&service, "P", jan(1), jan(10), &[]);
    let dependent = create(&service, "D", jan(10), jan(12), &[p.activity.id]);

    // Moving the prerequisite later would violate ordering if edges were
    // re-checked; an update without a dependency list leaves them alone.
    let moved = service
        .update_activity(
            p.activity.id,
            &ActivityPatch {
                end: Some(jan(11)),
                progress: Some(80),
                ..ActivityPatch::default()
            },
        )
        .unwrap();
    assert_eq!(moved.activity.end, jan(11));
    assert_eq!(moved.activity.progress, 80);
    assert!(moved.dependencies.is_empty());

    let untouched = service.get_activity(dependent.activity.id).unwrap();
    assert_eq!(untouched.dependencies, vec![p.activity.id]);
}

#[test]
fn resolver_returns_unchanged_marker_without_dependency_field() {
    let conn = setup();
    let repo = SqliteActivityRepository::try_new(&conn).unwrap();
    let activity = repo
        .insert_activity(&ganttline_core::Activity::new("A", jan(1), jan(2)), &[])
        .unwrap();
    let resolver = DependencyResolver::new(&repo);

    let unchanged = resolver
        .prepare_update(
            activity.id,
            &ActivityPatch {
                name: Some("renamed".to_string()),
                ..ActivityPatch::default()
            },
        )
        .unwrap();
    assert_eq!(unchanged.dependencies, DependencyChange::Unchanged);
    assert_eq!(unchanged.activity.name, "renamed");

    let cleared = resolver
        .prepare_update(
            activity.id,
            &ActivityPatch {
                dependencies: Some(Vec::new()),
                ..ActivityPatch::default()
            },
        )
        .unwrap();
    assert_eq!(cleared.dependencies, DependencyChange::Replace(Vec::new()));
}

#[test]
fn explicit_empty_list_clears_edges() {
    let conn = setup();
    let service = service(&conn);
    let p = create(&service, "P", jan(1), jan(2), &[]);
    let dependent = create(&service, "D", jan(3), jan(4), &[p.activity.id]);
    assert_eq!(edge_count(&conn), 1);

    let cleared = service
        .update_activity(
            dependent.activity.id,
            &ActivityPatch {
                dependencies: Some(Vec::new()),
                ..ActivityPatch::default()
            },
        )
        .unwrap();
    assert!(cleared.dependencies.is_empty());
    assert_eq!(edge_count(&conn), 0);
}

#[test]
fn partial_interval_update_is_checked_against_stored_bound() {
    let conn = setup();
    let service = service(&conn);
    let activity = create(&service, "A", jan(5), jan(10), &[]);

    let err = service
        .update_activity(
            activity.activity.id,
            &ActivityPatch {
                start: Some(jan(10)),
                ..ActivityPatch::default()
            },
        )
        .unwrap_err();
    assert_eq!(
        rejection(err),
        DependencyError::InvalidInterval {
            start: jan(10),
            end: jan(10)
        }
    );

    let err = service
        .update_activity(
            activity.activity.id,
            &ActivityPatch {
                end: Some(jan(4)),
                ..ActivityPatch::default()
            },
        )
        .unwrap_err();
    assert!(err.is_rejection());
}

#[test]
fn temporal_check_uses_effective_start_on_update() {
    let conn = setup();
    let service = service(&conn);
    let p = create(&service, "P", jan(1), jan(10), &[]);
    let d = create(&service, "D", jan(5), jan(20), &[]);

    let updated = service
        .update_activity(
            d.activity.id,
            &ActivityPatch {
                start: Some(jan(10)),
                dependencies: Some(vec![p.activity.id]),
                ..ActivityPatch::default()
            },
        )
        .unwrap();
    assert_eq!(updated.activity.start, jan(10));
    assert_eq!(updated.dependencies, vec![p.activity.id]);
}

#[test]
fn create_rejects_reversed_interval_before_dependency_work() {
    let conn = setup();
    let service = service(&conn);

    let err = service
        .create_activity(&NewActivity::new("bad", jan(2), jan(1)).depends_on([Uuid::new_v4()]))
        .unwrap_err();
    assert_eq!(
        rejection(err),
        DependencyError::InvalidInterval {
            start: jan(2),
            end: jan(1)
        }
    );
}

#[test]
fn create_with_explicit_id_checks_self_reference() {
    let conn = setup();
    let service = service(&conn);
    let id = Uuid::new_v4();

    let err = service
        .create_activity(&NewActivity {
            id: Some(id),
            ..NewActivity::new("imported", jan(3), jan(4)).depends_on([id])
        })
        .unwrap_err();
    assert_eq!(rejection(err), DependencyError::SelfReference(id));

    let created = service
        .create_activity(&NewActivity {
            id: Some(id),
            ..NewActivity::new("imported", jan(3), jan(4))
        })
        .unwrap();
    assert_eq!(created.activity.id, id);
}

#[test]
fn update_and_lookups_of_unknown_activity_are_not_found() {
    let conn = setup();
    let service = service(&conn);
    let ghost = Uuid::new_v4();

    let err = service
        .update_activity(ghost, &ActivityPatch::default())
        .unwrap_err();
    assert!(matches!(err, ActivityServiceError::NotFound(id) if id == ghost));
    assert!(!err.is_rejection());
    assert!(matches!(
        service.get_activity(ghost).unwrap_err(),
        ActivityServiceError::NotFound(_)
    ));
    assert!(matches!(
        service.list_dependents(ghost).unwrap_err(),
        ActivityServiceError::NotFound(_)
    ));
    assert!(matches!(
        service.delete_activity(ghost).unwrap_err(),
        ActivityServiceError::NotFound(_)
    ));
}

#[test]
fn invalid_fields_surface_as_invalid() {
    let conn = setup();
    let service = service(&conn);
    let activity = create(&service, "A", jan(1), jan(2), &[]);

    let err = service
        .update_activity(
            activity.activity.id,
            &ActivityPatch {
                progress: Some(150),
                ..ActivityPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ActivityServiceError::Invalid(_)));
    assert!(err.is_rejection());

    let err = service
        .create_activity(&NewActivity::new(" ", jan(1), jan(2)))
        .unwrap_err();
    assert!(matches!(err, ActivityServiceError::Invalid(_)));
}

#[test]
fn delete_removes_activity_from_dependents() {
    let conn = setup();
    let service = service(&conn);
    let p = create(&service, "P", jan(1), jan(2), &[]);
    let d = create(&service, "D", jan(3), jan(4), &[p.activity.id]);

    service.delete_activity(p.activity.id).unwrap();

    assert!(service.get_activity(d.activity.id).unwrap().dependencies.is_empty());
    assert_eq!(
        service.list_by_status(ganttline_core::ActivityStatus::Todo).unwrap().len(),
        1
    );
}

#[test]
fn create_with_taken_id_is_rejected_before_insert() {
    let conn = setup();
    let service = service(&conn);
    let existing = create(&service, "original", jan(1), jan(2), &[]);

    let err = service
        .create_activity(&NewActivity {
            id: Some(existing.activity.id),
            ..NewActivity::new("copy", jan(3), jan(4))
        })
        .unwrap_err();
    assert!(matches!(err, ActivityServiceError::AlreadyExists(id) if id == existing.activity.id));
    assert!(err.is_rejection());

    let stored = service.get_activity(existing.activity.id).unwrap();
    assert_eq!(stored.activity.name, "original");
    assert_eq!(service.list_lookups(&[]).unwrap().len(), 1);
}

#[test]
fn update_can_clear_description_and_color() {
    let conn = setup();
    let service = service(&conn);
    let created = service
        .create_activity(&NewActivity {
            description: Some("pour footings".to_string()),
            color: Some("#336699".to_string()),
            ..NewActivity::new("Foundation", jan(1), jan(3))
        })
        .unwrap();

    let cleared = service
        .update_activity(
            created.activity.id,
            &ActivityPatch {
                description: Some(None),
                color: Some(None),
                ..ActivityPatch::default()
            },
        )
        .unwrap();
    assert_eq!(cleared.activity.description, None);
    assert_eq!(cleared.activity.color, None);

    let stored = service.get_activity(created.activity.id).unwrap();
    assert_eq!(stored.activity.description, None);
    assert_eq!(stored.activity.color, None);
}
