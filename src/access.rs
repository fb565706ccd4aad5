//! Role-aware visibility and mutation rules.
//!
//! Every engine operation consults these predicates instead of branching on
//! roles inline, so the capability rules live in one place. Organization
//! scoping is NOT decided here: the engine resolves cross-tenant access to
//! NotFound before these predicates run, and callers of the pure functions
//! are expected to have matched organizations already (the predicates
//! still re-check as a guard).
//!
//! Rules:
//! - HR: full visibility and mutation inside their organization.
//! - EMPLOYEE: sees every instance about themselves; mutates only their own
//!   SELF instances.
//! - ASSESSOR: sees and mutates ASSESSOR instances where they are the
//!   assigned assessor; additionally may view an assigned employee's SELF
//!   instance once it is COMPLETED or REVIEWED, and may move it to REVIEWED
//!   (review of the self-assessment content, not ownership of it).

use crate::models::{CallerContext, EvaluationInstance, EvaluationType, Role};

/// Lifecycle action requested by a caller, for capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    Start,
    Complete,
    Review,
}

impl TransitionAction {
    pub fn name(&self) -> &'static str {
        match self {
            TransitionAction::Start => "start",
            TransitionAction::Complete => "complete",
            TransitionAction::Review => "review",
        }
    }
}

/// Whether the caller may read this instance and its ratings.
///
/// `assigned` is whether an AssessorAssignment links the caller to the
/// instance's employee; it only matters for ASSESSOR callers.
pub fn can_see(caller: &CallerContext, instance: &EvaluationInstance, assigned: bool) -> bool {
    if caller.organization_id != instance.organization_id {
        return false;
    }
    match caller.role {
        Role::Hr => true,
        Role::Employee => instance.employee_id == caller.user_id,
        Role::Assessor => match instance.evaluation_type {
            EvaluationType::Assessor => instance.assessor_id == Some(caller.user_id),
            EvaluationType::SelfReview => assigned && instance.status.is_settled(),
        },
    }
}

/// Whether the caller may write ratings/responses into this instance.
pub fn can_mutate(caller: &CallerContext, instance: &EvaluationInstance) -> bool {
    if caller.organization_id != instance.organization_id {
        return false;
    }
    match caller.role {
        Role::Hr => true,
        Role::Employee => instance.is_self() && instance.employee_id == caller.user_id,
        Role::Assessor => {
            instance.evaluation_type == EvaluationType::Assessor
                && instance.assessor_id == Some(caller.user_id)
        }
    }
}

/// Whether the caller may apply the given lifecycle transition.
///
/// Mutation rights carry over, plus one exception: an assessor linked to
/// the employee may review that employee's SELF instance.
pub fn can_transition(
    caller: &CallerContext,
    instance: &EvaluationInstance,
    action: TransitionAction,
    assigned: bool,
) -> bool {
    if can_mutate(caller, instance) {
        return true;
    }
    action == TransitionAction::Review
        && caller.role == Role::Assessor
        && caller.organization_id == instance.organization_id
        && instance.is_self()
        && assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EvaluationKind, EvaluationStatus};
    use uuid::Uuid;

    fn caller(role: Role, org: Uuid) -> CallerContext {
        CallerContext::new(Uuid::new_v4(), org, role)
    }

    fn self_instance(org: Uuid, employee: Uuid) -> EvaluationInstance {
        EvaluationInstance::new_self(org, employee, EvaluationKind::Competency, Uuid::new_v4())
    }

    #[test]
    fn test_hr_sees_and_mutates_in_org_only() {
        let org = Uuid::new_v4();
        let hr = caller(Role::Hr, org);
        let in_org = self_instance(org, Uuid::new_v4());
        let foreign = self_instance(Uuid::new_v4(), Uuid::new_v4());

        assert!(can_see(&hr, &in_org, false));
        assert!(can_mutate(&hr, &in_org));
        assert!(!can_see(&hr, &foreign, false));
        assert!(!can_mutate(&hr, &foreign));
    }

    #[test]
    fn test_employee_sees_own_instances_of_any_type() {
        let org = Uuid::new_v4();
        let employee = caller(Role::Employee, org);

        let own_self = self_instance(org, employee.user_id);
        let about_them = EvaluationInstance::new_assessor(
            org,
            employee.user_id,
            Uuid::new_v4(),
            EvaluationKind::Competency,
            Uuid::new_v4(),
        );
        let someone_else = self_instance(org, Uuid::new_v4());

        assert!(can_see(&employee, &own_self, false));
        assert!(can_see(&employee, &about_them, false));
        assert!(!can_see(&employee, &someone_else, false));

        // Mutation is limited to the employee's own SELF instance.
        assert!(can_mutate(&employee, &own_self));
        assert!(!can_mutate(&employee, &about_them));
        assert!(!can_mutate(&employee, &someone_else));
    }

    #[test]
    fn test_assessor_owns_only_their_assessor_instances() {
        let org = Uuid::new_v4();
        let assessor = caller(Role::Assessor, org);
        let employee = Uuid::new_v4();

        let theirs = EvaluationInstance::new_assessor(
            org,
            employee,
            assessor.user_id,
            EvaluationKind::Competency,
            Uuid::new_v4(),
        );
        let not_theirs = EvaluationInstance::new_assessor(
            org,
            employee,
            Uuid::new_v4(),
            EvaluationKind::Competency,
            Uuid::new_v4(),
        );

        assert!(can_see(&assessor, &theirs, false));
        assert!(can_mutate(&assessor, &theirs));
        assert!(!can_see(&assessor, &not_theirs, false));
        assert!(!can_mutate(&assessor, &not_theirs));
    }

    #[test]
    fn test_assessor_views_assigned_self_instance_after_completion() {
        let org = Uuid::new_v4();
        let assessor = caller(Role::Assessor, org);
        let mut instance = self_instance(org, Uuid::new_v4());

        // Not yet completed: invisible even when assigned.
        assert!(!can_see(&assessor, &instance, true));

        instance.status = EvaluationStatus::Completed;
        assert!(can_see(&assessor, &instance, true));
        // Visible but never mutable by the assessor.
        assert!(!can_mutate(&assessor, &instance));

        // Without an assignment the completed instance stays invisible.
        assert!(!can_see(&assessor, &instance, false));
    }

    #[test]
    fn test_assigned_assessor_may_review_self_instance() {
        let org = Uuid::new_v4();
        let assessor = caller(Role::Assessor, org);
        let mut instance = self_instance(org, Uuid::new_v4());
        instance.status = EvaluationStatus::Completed;

        assert!(can_transition(&assessor, &instance, TransitionAction::Review, true));
        assert!(!can_transition(&assessor, &instance, TransitionAction::Review, false));
        // The exception covers review only.
        assert!(!can_transition(&assessor, &instance, TransitionAction::Start, true));
        assert!(!can_transition(&assessor, &instance, TransitionAction::Complete, true));
    }

    #[test]
    fn test_employee_transitions_own_self_instance_only() {
        let org = Uuid::new_v4();
        let employee = caller(Role::Employee, org);
        let own = self_instance(org, employee.user_id);
        let other = self_instance(org, Uuid::new_v4());

        assert!(can_transition(&employee, &own, TransitionAction::Start, false));
        assert!(!can_transition(&employee, &other, TransitionAction::Start, false));
    }
}
