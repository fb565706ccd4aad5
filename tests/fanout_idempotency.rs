//! Integration: assessor fan-out on self-evaluation completion.
//!
//! Covers the two population rules (org-wide for competency assessments,
//! assignment-scoped for appraisals) and the idempotency guarantees: a
//! repeated completion creates nothing, and a fan-out racing a manually
//! created instance collapses onto the uniqueness key.

mod common;

use std::collections::HashSet;

use common::TestEnv;
use hr_eval::{EvaluationKind, EvaluationStatus, EvaluationType, ListQuery};
use uuid::Uuid;

#[tokio::test]
async fn completing_a_self_assessment_fans_out_to_every_org_assessor() {
    let env = TestEnv::new();
    let employee = env.employee();
    let a1 = env.assessor();
    let a2 = env.assessor();
    let a3 = env.assessor();

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
    let outcome = env
        .engine
        .complete_evaluation(&employee, instance.evaluation_id)
        .await
        .unwrap();
    assert_eq!(outcome.fanned_out, 3);

    let all = env
        .engine
        .list_evaluations(&env.hr(), ListQuery::default())
        .await
        .unwrap();
    let fanned: Vec<_> = all
        .iter()
        .filter(|i| i.evaluation_type == EvaluationType::Assessor)
        .collect();
    assert_eq!(fanned.len(), 3);

    let assessor_ids: HashSet<Uuid> = fanned.iter().filter_map(|i| i.assessor_id).collect();
    assert_eq!(
        assessor_ids,
        HashSet::from([a1.user_id, a2.user_id, a3.user_id])
    );
    for instance in &fanned {
        assert_eq!(instance.status, EvaluationStatus::Pending);
        assert_eq!(instance.employee_id, employee.user_id);
        assert_eq!(instance.cycle_id, env.cycle_id);
        // Fresh fan-out instances carry no ratings yet.
        let ratings = env
            .engine
            .ratings_for_evaluation(&env.hr(), instance.evaluation_id)
            .await
            .unwrap();
        assert!(ratings.is_empty());
    }
}

#[tokio::test]
async fn repeated_completion_creates_no_additional_instances() {
    let env = TestEnv::new();
    let employee = env.employee();
    env.assessor();
    env.assessor();

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

    let first = env
        .engine
        .complete_evaluation(&employee, instance.evaluation_id)
        .await
        .unwrap();
    assert_eq!(first.fanned_out, 2);

    // Retry after timeout / double-click: same call again.
    let second = env
        .engine
        .complete_evaluation(&employee, instance.evaluation_id)
        .await
        .unwrap();
    assert_eq!(second.fanned_out, 0);

    let all = env
        .engine
        .list_evaluations(&env.hr(), ListQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3); // the SELF instance + exactly 2 fan-outs
}

#[tokio::test]
async fn late_added_assessors_receive_no_instance_from_a_recompletion() {
    let env = TestEnv::new();
    let employee = env.employee();
    env.assessor();

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
        .complete_evaluation(&employee, instance.evaluation_id)
        .await
        .unwrap();

    // A new assessor joins after the fact; fan-out only fires on the
    // transition into COMPLETED, so they get nothing.
    env.assessor();
    let recompletion = env
        .engine
        .complete_evaluation(&employee, instance.evaluation_id)
        .await
        .unwrap();
    assert_eq!(recompletion.fanned_out, 0);

    let all = env
        .engine
        .list_evaluations(&env.hr(), ListQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn appraisal_fanout_targets_assigned_assessors_only() {
    let env = TestEnv::new();
    let employee = env.employee();
    // Three assessors in the org, only one assigned to this employee.
    env.assessor();
    env.assessor();
    let assigned = env.assessor();
    env.store
        .assign(env.organization_id, assigned.user_id, employee.user_id);

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
    let outcome = env
        .engine
        .complete_evaluation(&employee, instance.evaluation_id)
        .await
        .unwrap();
    assert_eq!(outcome.fanned_out, 1);

    let all = env
        .engine
        .list_evaluations(&env.hr(), ListQuery::default())
        .await
        .unwrap();
    let fanned: Vec<_> = all
        .iter()
        .filter(|i| i.evaluation_type == EvaluationType::Assessor)
        .collect();
    assert_eq!(fanned.len(), 1);
    assert_eq!(fanned[0].assessor_id, Some(assigned.user_id));
    assert_eq!(fanned[0].kind, EvaluationKind::Appraisal);
}

#[tokio::test]
async fn fanout_skips_an_instance_the_assessor_created_ahead_of_time() {
    let env = TestEnv::new();
    let employee = env.employee();
    let eager = env.assessor();
    let other = env.assessor();

    // The assessor opens their instance before the employee finishes.
    let manual = env
        .engine
        .create_assessor_evaluation(
            &eager,
            employee.user_id,
            eager.user_id,
            EvaluationKind::Competency,
            env.cycle_id,
        )
        .await
        .unwrap();

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
    let outcome = env
        .engine
        .complete_evaluation(&employee, instance.evaluation_id)
        .await
        .unwrap();
    // Only the other assessor's instance is new.
    assert_eq!(outcome.fanned_out, 1);

    let all = env
        .engine
        .list_evaluations(&env.hr(), ListQuery::default())
        .await
        .unwrap();
    let fanned: Vec<_> = all
        .iter()
        .filter(|i| i.evaluation_type == EvaluationType::Assessor)
        .collect();
    assert_eq!(fanned.len(), 2);
    assert!(fanned
        .iter()
        .any(|i| i.evaluation_id == manual.evaluation_id));
    assert!(fanned.iter().any(|i| i.assessor_id == Some(other.user_id)));
}

#[tokio::test]
async fn creating_an_assessor_evaluation_twice_returns_the_existing_row() {
    let env = TestEnv::new();
    let employee = env.employee();
    let assessor = env.assessor();

    let first = env
        .engine
        .create_assessor_evaluation(
            &assessor,
            employee.user_id,
            assessor.user_id,
            EvaluationKind::Competency,
            env.cycle_id,
        )
        .await
        .unwrap();
    let second = env
        .engine
        .create_assessor_evaluation(
            &assessor,
            employee.user_id,
            assessor.user_id,
            EvaluationKind::Competency,
            env.cycle_id,
        )
        .await
        .unwrap();
    assert_eq!(first.evaluation_id, second.evaluation_id);
}
