//! Integration: role-scoped listing, rating submission rules, and the
//! shared-row appraisal round-trip.

mod common;

use common::TestEnv;
use hr_eval::{
    EvaluationKind, EvaluationStatus, EvaluationType, ListQuery, WorkflowError,
};
use uuid::Uuid;

#[tokio::test]
async fn employees_list_only_instances_about_themselves() {
    let env = TestEnv::new();
    let alice = env.employee();
    let bob = env.employee();
    env.assessor();

    for caller in [&alice, &bob] {
        let instance = env
            .engine
            .create_self_evaluation(
                caller,
                caller.user_id,
                EvaluationKind::Competency,
                env.cycle_id,
            )
            .await
            .unwrap();
        env.engine
            .complete_evaluation(caller, instance.evaluation_id)
            .await
            .unwrap();
    }

    let listed = env
        .engine
        .list_evaluations(&alice, ListQuery::default())
        .await
        .unwrap();
    assert!(!listed.is_empty());
    assert!(listed.iter().all(|i| i.employee_id == alice.user_id));
}

#[tokio::test]
async fn assessors_list_their_instances_and_assigned_completed_selfs() {
    let env = TestEnv::new();
    let employee = env.employee();
    let assessor = env.assessor();
    let other_assessor = env.assessor();
    env.store
        .assign(env.organization_id, assessor.user_id, employee.user_id);

    let instance = env
        .engine
        .create_self_evaluation(
            &employee,
            employee.user_id,
            EvaluationKind::Competency,
            env.cycle_id,
        )
        .await
        .unwrap();

    // Before completion the assigned assessor sees nothing of the SELF
    // instance.
    let before = env
        .engine
        .list_evaluations(&assessor, ListQuery::default())
        .await
        .unwrap();
    assert!(before.iter().all(|i| !i.is_self()));

    env.engine
        .complete_evaluation(&employee, instance.evaluation_id)
        .await
        .unwrap();

    let listed = env
        .engine
        .list_evaluations(&assessor, ListQuery::default())
        .await
        .unwrap();
    // Their own fan-out instance plus the completed self assessment.
    assert!(listed
        .iter()
        .any(|i| i.evaluation_type == EvaluationType::Assessor
            && i.assessor_id == Some(assessor.user_id)));
    assert!(listed.iter().any(|i| i.is_self()));
    // Never another assessor's instance.
    assert!(listed
        .iter()
        .all(|i| i.evaluation_type != EvaluationType::Assessor
            || i.assessor_id == Some(assessor.user_id)));

    // The unassigned assessor sees only their own fan-out instance.
    let other_listed = env
        .engine
        .list_evaluations(&other_assessor, ListQuery::default())
        .await
        .unwrap();
    assert!(other_listed.iter().all(|i| {
        i.evaluation_type == EvaluationType::Assessor
            && i.assessor_id == Some(other_assessor.user_id)
    }));
}

#[tokio::test]
async fn list_filters_narrow_by_status_kind_and_cycle() {
    let env = TestEnv::new();
    let hr = env.hr();
    let employee = env.employee();

    let competency = env
        .engine
        .create_self_evaluation(
            &employee,
            employee.user_id,
            EvaluationKind::Competency,
            env.cycle_id,
        )
        .await
        .unwrap();
    let other_cycle = Uuid::new_v4();
    env.engine
        .create_self_evaluation(
            &employee,
            employee.user_id,
            EvaluationKind::Appraisal,
            other_cycle,
        )
        .await
        .unwrap();
    env.engine
        .complete_evaluation(&employee, competency.evaluation_id)
        .await
        .unwrap();

    let completed = env
        .engine
        .list_evaluations(
            &hr,
            ListQuery {
                status: Some(EvaluationStatus::Completed),
                ..ListQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].evaluation_id, competency.evaluation_id);

    let appraisals = env
        .engine
        .list_evaluations(
            &hr,
            ListQuery {
                kind: Some(EvaluationKind::Appraisal),
                ..ListQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(appraisals.len(), 1);
    assert_eq!(appraisals[0].kind, EvaluationKind::Appraisal);

    let this_cycle = env
        .engine
        .list_evaluations(
            &hr,
            ListQuery {
                cycle_id: Some(env.cycle_id),
                ..ListQuery::default()
            },
        )
        .await
        .unwrap();
    assert!(this_cycle.iter().all(|i| i.cycle_id == env.cycle_id));
}

#[tokio::test]
async fn ratings_accept_the_full_scale_and_nothing_else() {
    let env = TestEnv::new();
    let employee = env.employee();
    let instance = env
        .engine
        .create_self_evaluation(
            &employee,
            employee.user_id,
            EvaluationKind::Competency,
            env.cycle_id,
        )
        .await
        .unwrap();

    for rating in 1..=5 {
        env.engine
            .submit_rating(&employee, instance.evaluation_id, Uuid::new_v4(), rating, None)
            .await
            .unwrap();
    }
    for rating in [0, 6, -3] {
        let err = env
            .engine
            .submit_rating(&employee, instance.evaluation_id, Uuid::new_v4(), rating, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { .. }));
    }
}

#[tokio::test]
async fn ratings_lock_once_the_instance_completes() {
    let env = TestEnv::new();
    let employee = env.employee();
    let competency = Uuid::new_v4();
    let instance = env
        .engine
        .create_self_evaluation(
            &employee,
            employee.user_id,
            EvaluationKind::Competency,
            env.cycle_id,
        )
        .await
        .unwrap();

    env.engine
        .submit_rating(&employee, instance.evaluation_id, competency, 2, None)
        .await
        .unwrap();
    // Correction before completion overwrites in place.
    env.engine
        .submit_rating(&employee, instance.evaluation_id, competency, 3, None)
        .await
        .unwrap();
    let ratings = env
        .engine
        .ratings_for_evaluation(&employee, instance.evaluation_id)
        .await
        .unwrap();
    assert_eq!(ratings.len(), 1);
    assert_eq!(ratings[0].rating, 3);

    env.engine
        .complete_evaluation(&employee, instance.evaluation_id)
        .await
        .unwrap();
    let err = env
        .engine
        .submit_rating(&employee, instance.evaluation_id, competency, 5, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::InvalidTransition {
            from: EvaluationStatus::Completed,
            ..
        }
    ));
}

#[tokio::test]
async fn competency_ratings_reject_appraisal_instances() {
    let env = TestEnv::new();
    let employee = env.employee();
    let instance = env
        .engine
        .create_self_evaluation(
            &employee,
            employee.user_id,
            EvaluationKind::Appraisal,
            env.cycle_id,
        )
        .await
        .unwrap();

    let err = env
        .engine
        .submit_rating(&employee, instance.evaluation_id, Uuid::new_v4(), 3, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation { .. }));
}

#[tokio::test]
async fn appraisal_round_trip_preserves_the_other_side() {
    let env = TestEnv::new();
    let question = Uuid::new_v4();
    let employee = env.employee();
    let assessor = env.assessor();
    env.store
        .assign(env.organization_id, assessor.user_id, employee.user_id);

    // Both instances open up front: the assessor is allowed to create
    // theirs ahead of the employee's completion.
    let self_instance = env
        .engine
        .create_self_evaluation(
            &employee,
            employee.user_id,
            EvaluationKind::Appraisal,
            env.cycle_id,
        )
        .await
        .unwrap();
    let assessor_instance = env
        .engine
        .create_assessor_evaluation(
            &assessor,
            employee.user_id,
            assessor.user_id,
            EvaluationKind::Appraisal,
            env.cycle_id,
        )
        .await
        .unwrap();

    // Employee writes first, assessor second, into the same row.
    env.engine
        .submit_response(&employee, self_instance.evaluation_id, question, 4, Some("steady".into()))
        .await
        .unwrap();
    let row = env
        .engine
        .submit_response(&assessor, assessor_instance.evaluation_id, question, 5, None)
        .await
        .unwrap();
    assert_eq!(row.employee_rating, Some(4));
    assert_eq!(row.assessor_rating, Some(5));

    // Employee rewrites their side; the assessor's rating survives.
    let row = env
        .engine
        .submit_response(&employee, self_instance.evaluation_id, question, 3, None)
        .await
        .unwrap();
    assert_eq!(row.employee_rating, Some(3));
    assert_eq!(row.assessor_rating, Some(5));

    // Exactly one shared row exists.
    let rows = env
        .engine
        .responses_for_evaluation(&employee, self_instance.evaluation_id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn unassigned_assessor_cannot_open_an_appraisal() {
    let env = TestEnv::new();
    let employee = env.employee();
    let assessor = env.assessor();

    let err = env
        .engine
        .create_assessor_evaluation(
            &assessor,
            employee.user_id,
            assessor.user_id,
            EvaluationKind::Appraisal,
            env.cycle_id,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden { .. }));
}
