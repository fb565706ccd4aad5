//! Assessor fan-out.
//!
//! When a SELF evaluation crosses into COMPLETED, one ASSESSOR instance is
//! created per relevant assessor. The relevant set differs by kind and the
//! asymmetry is intentional (see DESIGN.md): competency assessments go to
//! every assessor in the organization, appraisals only to assessors
//! explicitly assigned to the employee.
//!
//! This component only plans the instances. Deduplication happens at the
//! store against the (employee, assessor, kind, cycle) uniqueness key, so
//! concurrent or repeated completion calls cannot produce duplicates.

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::models::{EvaluationInstance, EvaluationKind};
use crate::store::{AssignmentDirectory, UserDirectory};

/// Plans the ASSESSOR instances a completed SELF evaluation fans out to.
pub struct FanOutTrigger {
    users: Arc<dyn UserDirectory>,
    assignments: Arc<dyn AssignmentDirectory>,
}

impl FanOutTrigger {
    pub fn new(users: Arc<dyn UserDirectory>, assignments: Arc<dyn AssignmentDirectory>) -> Self {
        Self { users, assignments }
    }

    /// Resolve the assessor population for the seed instance.
    pub async fn assessor_population(&self, seed: &EvaluationInstance) -> Result<Vec<Uuid>> {
        let assessors = match seed.kind {
            EvaluationKind::Competency => {
                self.users
                    .assessor_ids_in_org(seed.organization_id)
                    .await?
            }
            EvaluationKind::Appraisal => {
                self.assignments
                    .assessors_for_employee(seed.organization_id, seed.employee_id)
                    .await?
            }
        };
        debug!(
            evaluation = %seed.evaluation_id,
            kind = ?seed.kind,
            assessors = assessors.len(),
            "resolved fan-out population"
        );
        Ok(assessors)
    }

    /// Build one PENDING ASSESSOR instance per assessor in the population.
    pub fn plan(&self, seed: &EvaluationInstance, assessors: &[Uuid]) -> Vec<EvaluationInstance> {
        assessors
            .iter()
            .map(|assessor_id| {
                EvaluationInstance::new_assessor(
                    seed.organization_id,
                    seed.employee_id,
                    *assessor_id,
                    seed.kind,
                    seed.cycle_id,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EvaluationStatus;
    use crate::store::MemoryStore;

    fn trigger(store: Arc<MemoryStore>) -> FanOutTrigger {
        FanOutTrigger::new(store.clone(), store)
    }

    #[tokio::test]
    async fn test_competency_population_is_org_wide() {
        let store = Arc::new(MemoryStore::new());
        let org = Uuid::new_v4();
        let a1 = Uuid::new_v4();
        let a2 = Uuid::new_v4();
        store.add_assessor(org, a1);
        store.add_assessor(org, a2);
        // Assessors in another org stay out of scope.
        store.add_assessor(Uuid::new_v4(), Uuid::new_v4());

        let seed = EvaluationInstance::new_self(
            org,
            Uuid::new_v4(),
            EvaluationKind::Competency,
            Uuid::new_v4(),
        );
        let population = trigger(store).assessor_population(&seed).await.unwrap();
        assert_eq!(population, vec![a1, a2]);
    }

    #[tokio::test]
    async fn test_appraisal_population_is_assignment_scoped() {
        let store = Arc::new(MemoryStore::new());
        let org = Uuid::new_v4();
        let employee = Uuid::new_v4();
        let assigned = Uuid::new_v4();
        // Org-wide assessor who is NOT assigned to this employee.
        store.add_assessor(org, Uuid::new_v4());
        store.add_assessor(org, assigned);
        store.assign(org, assigned, employee);

        let seed =
            EvaluationInstance::new_self(org, employee, EvaluationKind::Appraisal, Uuid::new_v4());
        let population = trigger(store).assessor_population(&seed).await.unwrap();
        assert_eq!(population, vec![assigned]);
    }

    #[tokio::test]
    async fn test_planned_instances_are_pending_assessor_copies() {
        let store = Arc::new(MemoryStore::new());
        let org = Uuid::new_v4();
        let employee = Uuid::new_v4();
        let cycle = Uuid::new_v4();
        let seed = EvaluationInstance::new_self(org, employee, EvaluationKind::Competency, cycle);

        let assessors = vec![Uuid::new_v4(), Uuid::new_v4()];
        let planned = trigger(store).plan(&seed, &assessors);

        assert_eq!(planned.len(), 2);
        for (instance, assessor_id) in planned.iter().zip(&assessors) {
            assert_eq!(instance.status, EvaluationStatus::Pending);
            assert_eq!(instance.assessor_id, Some(*assessor_id));
            assert_eq!(instance.employee_id, employee);
            assert_eq!(instance.cycle_id, cycle);
            assert_eq!(instance.kind, seed.kind);
            assert!(!instance.is_self());
        }
    }
}
