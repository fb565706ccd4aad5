//! The evaluation engine.
//!
//! Owns the storage and directory handles and drives every workflow
//! operation. Each operation follows the same shape: load the instance,
//! fold cross-tenant access into NotFound, consult the access filter,
//! validate the lifecycle transition, persist. Completion of a SELF
//! instance additionally runs the fan-out trigger inside the store's
//! atomic completion operation.
//!
//! Notification delivery is deliberately absent: the surrounding service
//! decides what to send after a completion, this engine only reports what
//! happened.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::access::{self, TransitionAction};
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{
    CallerContext, EvaluationInstance, EvaluationKind, EvaluationStatus, QuestionResponse,
    RatingEntry, RatingSide, Role,
};
use crate::store::{
    AssignmentDirectory, EvaluationFilter, EvaluationStore, RatingStore, ResponseKey,
    UserDirectory,
};

use super::FanOutTrigger;

/// Result of a completion call: the updated instance plus how many
/// assessor instances the fan-out actually created (0 on repeat calls).
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub instance: EvaluationInstance,
    pub fanned_out: usize,
}

/// Optional narrowing criteria for `list_evaluations`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListQuery {
    pub status: Option<EvaluationStatus>,
    pub kind: Option<EvaluationKind>,
    pub cycle_id: Option<Uuid>,
}

/// Drives the evaluation workflow against the configured stores.
pub struct EvaluationEngine {
    evaluations: Arc<dyn EvaluationStore>,
    ratings: Arc<dyn RatingStore>,
    assignments: Arc<dyn AssignmentDirectory>,
    fanout: FanOutTrigger,
}

impl EvaluationEngine {
    pub fn new(
        evaluations: Arc<dyn EvaluationStore>,
        ratings: Arc<dyn RatingStore>,
        users: Arc<dyn UserDirectory>,
        assignments: Arc<dyn AssignmentDirectory>,
    ) -> Self {
        Self {
            evaluations,
            ratings,
            assignments: assignments.clone(),
            fanout: FanOutTrigger::new(users, assignments),
        }
    }

    /// Create (or return the already-open) SELF evaluation for an employee
    /// in a cycle.
    pub async fn create_self_evaluation(
        &self,
        caller: &CallerContext,
        employee_id: Uuid,
        kind: EvaluationKind,
        cycle_id: Uuid,
    ) -> WorkflowResult<EvaluationInstance> {
        let permitted = match caller.role {
            Role::Hr => true,
            Role::Employee => caller.user_id == employee_id,
            Role::Assessor => false,
        };
        if !permitted {
            return Err(WorkflowError::forbidden(
                "only the employee or HR may open a self evaluation",
            ));
        }

        let candidate =
            EvaluationInstance::new_self(caller.organization_id, employee_id, kind, cycle_id);
        let outcome = self.evaluations.create_self(&candidate).await?;
        if outcome.was_created() {
            info!(
                evaluation = %candidate.evaluation_id,
                employee = %employee_id,
                kind = ?kind,
                "created self evaluation"
            );
        }
        Ok(outcome.into_instance())
    }

    /// Create (or return the existing) ASSESSOR evaluation for an
    /// (employee, assessor) pair in a cycle.
    pub async fn create_assessor_evaluation(
        &self,
        caller: &CallerContext,
        employee_id: Uuid,
        assessor_id: Uuid,
        kind: EvaluationKind,
        cycle_id: Uuid,
    ) -> WorkflowResult<EvaluationInstance> {
        match caller.role {
            Role::Hr => {}
            Role::Assessor if caller.user_id == assessor_id => {
                // Appraisals are assignment-scoped; an assessor cannot open
                // one for an employee they are not linked to.
                if kind == EvaluationKind::Appraisal
                    && !self
                        .assignments
                        .is_assigned(caller.organization_id, assessor_id, employee_id)
                        .await?
                {
                    return Err(WorkflowError::forbidden(
                        "assessor is not assigned to this employee",
                    ));
                }
            }
            _ => {
                return Err(WorkflowError::forbidden(
                    "only the assessor themselves or HR may open an assessor evaluation",
                ));
            }
        }

        let candidate = EvaluationInstance::new_assessor(
            caller.organization_id,
            employee_id,
            assessor_id,
            kind,
            cycle_id,
        );
        let outcome = self.evaluations.create_assessor(&candidate).await?;
        if outcome.was_created() {
            info!(
                evaluation = %candidate.evaluation_id,
                employee = %employee_id,
                assessor = %assessor_id,
                kind = ?kind,
                "created assessor evaluation"
            );
        }
        Ok(outcome.into_instance())
    }

    /// Transition PENDING → IN_PROGRESS (idempotent from IN_PROGRESS).
    pub async fn start_evaluation(
        &self,
        caller: &CallerContext,
        evaluation_id: Uuid,
    ) -> WorkflowResult<EvaluationInstance> {
        let instance = self.load_scoped(caller, evaluation_id).await?;
        let assigned = self.assessor_link(caller, &instance).await?;
        if !access::can_transition(caller, &instance, TransitionAction::Start, assigned) {
            return Err(WorkflowError::forbidden("cannot start this evaluation"));
        }

        let updated = instance.start()?;
        self.evaluations.save_status(&updated).await?;
        info!(evaluation = %evaluation_id, "evaluation started");
        Ok(updated)
    }

    /// Transition into COMPLETED. The first completion of a SELF instance
    /// fans out ASSESSOR instances atomically with the status change.
    pub async fn complete_evaluation(
        &self,
        caller: &CallerContext,
        evaluation_id: Uuid,
    ) -> WorkflowResult<CompletionOutcome> {
        let instance = self.load_scoped(caller, evaluation_id).await?;
        let assigned = self.assessor_link(caller, &instance).await?;
        if !access::can_transition(caller, &instance, TransitionAction::Complete, assigned) {
            return Err(WorkflowError::forbidden("cannot complete this evaluation"));
        }

        let (updated, fan_out) = instance.complete()?;

        let fanned_out = if fan_out {
            let population = self.fanout.assessor_population(&updated).await?;
            let planned = self.fanout.plan(&updated, &population);
            let created = self
                .evaluations
                .complete_with_fanout(&updated, &planned)
                .await?;
            info!(
                evaluation = %evaluation_id,
                planned = planned.len(),
                created,
                "self evaluation completed, assessor fan-out applied"
            );
            created
        } else {
            self.evaluations.save_status(&updated).await?;
            info!(evaluation = %evaluation_id, "evaluation completed");
            0
        };

        Ok(CompletionOutcome {
            instance: updated,
            fanned_out,
        })
    }

    /// Transition COMPLETED → REVIEWED.
    pub async fn review_evaluation(
        &self,
        caller: &CallerContext,
        evaluation_id: Uuid,
    ) -> WorkflowResult<EvaluationInstance> {
        let instance = self.load_scoped(caller, evaluation_id).await?;
        let assigned = self.assessor_link(caller, &instance).await?;
        if !access::can_transition(caller, &instance, TransitionAction::Review, assigned) {
            return Err(WorkflowError::forbidden("cannot review this evaluation"));
        }

        let updated = instance.review()?;
        self.evaluations.save_status(&updated).await?;
        info!(evaluation = %evaluation_id, "evaluation reviewed");
        Ok(updated)
    }

    /// Record (or correct) a competency rating on an open instance.
    pub async fn submit_rating(
        &self,
        caller: &CallerContext,
        evaluation_id: Uuid,
        competency_id: Uuid,
        rating: i16,
        comment: Option<String>,
    ) -> WorkflowResult<RatingEntry> {
        let instance = self.load_scoped(caller, evaluation_id).await?;
        if !access::can_mutate(caller, &instance) {
            return Err(WorkflowError::forbidden(
                "cannot submit ratings on this evaluation",
            ));
        }
        if instance.kind != EvaluationKind::Competency {
            return Err(WorkflowError::validation(
                "competency ratings apply to competency assessments only",
            ));
        }
        validate_rating(rating)?;
        if !instance.accepts_ratings() {
            return Err(WorkflowError::InvalidTransition {
                from: instance.status,
                action: "submit ratings to",
            });
        }

        let entry = RatingEntry::new(evaluation_id, competency_id, rating, comment);
        let stored = self.ratings.upsert_rating(&entry).await?;
        info!(
            evaluation = %evaluation_id,
            competency = %competency_id,
            rating,
            "rating recorded"
        );
        Ok(stored)
    }

    /// Write one side of a shared appraisal response. Which side is
    /// derived from the instance type: a SELF instance writes the employee
    /// columns, an ASSESSOR instance the assessor columns.
    pub async fn submit_response(
        &self,
        caller: &CallerContext,
        evaluation_id: Uuid,
        question_id: Uuid,
        rating: i16,
        comment: Option<String>,
    ) -> WorkflowResult<QuestionResponse> {
        let instance = self.load_scoped(caller, evaluation_id).await?;
        if !access::can_mutate(caller, &instance) {
            return Err(WorkflowError::forbidden(
                "cannot submit responses on this evaluation",
            ));
        }
        if instance.kind != EvaluationKind::Appraisal {
            return Err(WorkflowError::validation(
                "question responses apply to appraisals only",
            ));
        }
        validate_rating(rating)?;
        if !instance.accepts_ratings() {
            return Err(WorkflowError::InvalidTransition {
                from: instance.status,
                action: "submit responses to",
            });
        }

        let side = if instance.is_self() {
            RatingSide::Employee
        } else {
            RatingSide::Assessor
        };
        let key = ResponseKey {
            organization_id: instance.organization_id,
            employee_id: instance.employee_id,
            cycle_id: instance.cycle_id,
            question_id,
        };
        let stored = self
            .ratings
            .upsert_response(&key, side, rating, comment.as_deref())
            .await?;
        info!(
            evaluation = %evaluation_id,
            question = %question_id,
            side = ?side,
            rating,
            "response recorded"
        );
        Ok(stored)
    }

    /// Fetch a single instance the caller is allowed to see.
    pub async fn get_evaluation(
        &self,
        caller: &CallerContext,
        evaluation_id: Uuid,
    ) -> WorkflowResult<EvaluationInstance> {
        let instance = self.load_scoped(caller, evaluation_id).await?;
        let assigned = self.assessor_link(caller, &instance).await?;
        if !access::can_see(caller, &instance, assigned) {
            return Err(WorkflowError::forbidden("cannot view this evaluation"));
        }
        Ok(instance)
    }

    /// Ratings of an instance the caller may see.
    pub async fn ratings_for_evaluation(
        &self,
        caller: &CallerContext,
        evaluation_id: Uuid,
    ) -> WorkflowResult<Vec<RatingEntry>> {
        let instance = self.get_evaluation(caller, evaluation_id).await?;
        Ok(self.ratings.ratings_for(instance.evaluation_id).await?)
    }

    /// Appraisal responses visible through an instance the caller may see.
    pub async fn responses_for_evaluation(
        &self,
        caller: &CallerContext,
        evaluation_id: Uuid,
    ) -> WorkflowResult<Vec<QuestionResponse>> {
        let instance = self.get_evaluation(caller, evaluation_id).await?;
        if instance.kind != EvaluationKind::Appraisal {
            return Err(WorkflowError::validation(
                "question responses apply to appraisals only",
            ));
        }
        Ok(self
            .ratings
            .responses_for_employee(
                instance.organization_id,
                instance.employee_id,
                instance.cycle_id,
            )
            .await?)
    }

    /// List the instances the caller may see, optionally narrowed.
    pub async fn list_evaluations(
        &self,
        caller: &CallerContext,
        query: ListQuery,
    ) -> WorkflowResult<Vec<EvaluationInstance>> {
        let mut filter = EvaluationFilter::for_org(caller.organization_id);
        filter.status = query.status;
        filter.kind = query.kind;
        filter.cycle_id = query.cycle_id;

        // Narrow at the store where the role makes it cheap.
        if caller.role == Role::Employee {
            filter.employee_id = Some(caller.user_id);
        }

        let instances = self.evaluations.list(&filter).await?;
        let assigned = self.assigned_employees(caller).await?;
        Ok(instances
            .into_iter()
            .filter(|instance| {
                access::can_see(caller, instance, assigned.contains(&instance.employee_id))
            })
            .collect())
    }

    /// Load an instance, folding "absent" and "other tenant" into the same
    /// NotFound so cross-org existence never leaks.
    async fn load_scoped(
        &self,
        caller: &CallerContext,
        evaluation_id: Uuid,
    ) -> WorkflowResult<EvaluationInstance> {
        let instance = self
            .evaluations
            .fetch(evaluation_id)
            .await?
            .ok_or(WorkflowError::not_found("evaluation"))?;
        if instance.organization_id != caller.organization_id {
            return Err(WorkflowError::not_found("evaluation"));
        }
        Ok(instance)
    }

    /// Whether an assignment links an assessor caller to the instance's
    /// employee. Always false for other roles.
    async fn assessor_link(
        &self,
        caller: &CallerContext,
        instance: &EvaluationInstance,
    ) -> WorkflowResult<bool> {
        if caller.role != Role::Assessor {
            return Ok(false);
        }
        Ok(self
            .assignments
            .is_assigned(caller.organization_id, caller.user_id, instance.employee_id)
            .await?)
    }

    async fn assigned_employees(&self, caller: &CallerContext) -> WorkflowResult<HashSet<Uuid>> {
        if caller.role != Role::Assessor {
            return Ok(HashSet::new());
        }
        Ok(self
            .assignments
            .employees_for_assessor(caller.organization_id, caller.user_id)
            .await?
            .into_iter()
            .collect())
    }
}

fn validate_rating(rating: i16) -> WorkflowResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(WorkflowError::validation(format!(
            "rating {rating} outside the 1..=5 scale"
        )));
    }
    Ok(())
}
