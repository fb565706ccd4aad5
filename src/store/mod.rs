//! Storage and directory seams for the evaluation workflow.
//!
//! The engine talks to persistence and to the platform's external
//! directories (users, assignments, job placements) exclusively through
//! these traits. `MemoryStore` implements all of them for tests and local
//! development; the Postgres implementations live in `crate::database`.
//!
//! Store methods return `anyhow::Result`; infrastructure faults carry
//! context and surface as `WorkflowError::Storage` at the engine boundary.
//! Business rules (who may write, when writes are legal) are the engine's
//! job, not the store's; the one rule stores do own is the fan-out
//! idempotency key: creating an ASSESSOR instance for an existing
//! (employee, assessor, kind, cycle) combination must be a no-op, not a
//! duplicate and not an error.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{
    EvaluationInstance, EvaluationKind, EvaluationStatus, JobPlacement, QuestionResponse,
    RatingEntry, RatingSide,
};

mod memory;

pub use memory::MemoryStore;

/// Outcome of a create-or-get against one of the uniqueness keys.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(EvaluationInstance),
    Existing(EvaluationInstance),
}

impl CreateOutcome {
    pub fn was_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }

    pub fn into_instance(self) -> EvaluationInstance {
        match self {
            CreateOutcome::Created(instance) | CreateOutcome::Existing(instance) => instance,
        }
    }
}

/// Filter for listing evaluation instances. Always organization-scoped.
#[derive(Debug, Clone)]
pub struct EvaluationFilter {
    pub organization_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub assessor_id: Option<Uuid>,
    pub kind: Option<EvaluationKind>,
    pub status: Option<EvaluationStatus>,
    pub cycle_id: Option<Uuid>,
    /// Restrict to COMPLETED/REVIEWED instances (the gap-analysis
    /// population).
    pub settled_only: bool,
}

impl EvaluationFilter {
    pub fn for_org(organization_id: Uuid) -> Self {
        Self {
            organization_id,
            employee_id: None,
            assessor_id: None,
            kind: None,
            status: None,
            cycle_id: None,
            settled_only: false,
        }
    }
}

/// Persistence for evaluation instances.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    /// Fetch by id, across the whole platform (tenant scoping is the
    /// engine's job so cross-org lookups can be folded into NotFound).
    async fn fetch(&self, evaluation_id: Uuid) -> Result<Option<EvaluationInstance>>;

    /// Create a SELF instance unless one is already open for the same
    /// (employee, kind, cycle); returns the surviving row either way.
    async fn create_self(&self, instance: &EvaluationInstance) -> Result<CreateOutcome>;

    /// Create an ASSESSOR instance unless the (employee, assessor, kind,
    /// cycle) key already exists; returns the surviving row either way.
    async fn create_assessor(&self, instance: &EvaluationInstance) -> Result<CreateOutcome>;

    /// Persist a status/timestamp change produced by a lifecycle
    /// transition.
    async fn save_status(&self, instance: &EvaluationInstance) -> Result<()>;

    /// Atomically persist a completion together with its fan-out: the
    /// status update and the per-assessor creates commit or fail as one
    /// unit. Instances whose idempotency key already exists are skipped.
    /// Returns how many fan-out instances were actually created.
    async fn complete_with_fanout(
        &self,
        instance: &EvaluationInstance,
        fanout: &[EvaluationInstance],
    ) -> Result<usize>;

    /// List instances matching the filter, oldest first.
    async fn list(&self, filter: &EvaluationFilter) -> Result<Vec<EvaluationInstance>>;
}

/// Key addressing one shared appraisal response row.
#[derive(Debug, Clone, Copy)]
pub struct ResponseKey {
    pub organization_id: Uuid,
    pub employee_id: Uuid,
    pub cycle_id: Uuid,
    pub question_id: Uuid,
}

/// Persistence for competency ratings and appraisal responses.
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Create or correct a competency rating. Keyed per
    /// (evaluation, competency): re-submission before the instance settles
    /// overwrites the earlier value.
    async fn upsert_rating(&self, entry: &RatingEntry) -> Result<RatingEntry>;

    /// Ratings for one instance, in competency order.
    async fn ratings_for(&self, evaluation_id: Uuid) -> Result<Vec<RatingEntry>>;

    /// Ratings for a population of instances, in competency order.
    async fn ratings_for_many(&self, evaluation_ids: &[Uuid]) -> Result<Vec<RatingEntry>>;

    /// Create the shared response row on first write and update only the
    /// columns belonging to `side` on subsequent writes.
    async fn upsert_response(
        &self,
        key: &ResponseKey,
        side: RatingSide,
        rating: i16,
        comment: Option<&str>,
    ) -> Result<QuestionResponse>;

    /// All response rows for one employee in one cycle, in question order.
    async fn responses_for_employee(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        cycle_id: Uuid,
    ) -> Result<Vec<QuestionResponse>>;
}

/// User/role directory: external collaborator, read-only here.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// All users holding the ASSESSOR role in the organization.
    async fn assessor_ids_in_org(&self, organization_id: Uuid) -> Result<Vec<Uuid>>;
}

/// Assessor-assignment directory: external collaborator, read-only here.
#[async_trait]
pub trait AssignmentDirectory: Send + Sync {
    /// Assessors explicitly assigned to the employee.
    async fn assessors_for_employee(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Vec<Uuid>>;

    /// Employees the assessor is assigned to.
    async fn employees_for_assessor(
        &self,
        organization_id: Uuid,
        assessor_id: Uuid,
    ) -> Result<Vec<Uuid>>;

    /// Whether an assignment links the assessor to the employee.
    async fn is_assigned(
        &self,
        organization_id: Uuid,
        assessor_id: Uuid,
        employee_id: Uuid,
    ) -> Result<bool>;
}

/// Organization/job/department directory: external collaborator, used for
/// gap-analysis granularity resolution at query time.
#[async_trait]
pub trait OrgDirectory: Send + Sync {
    /// Current job placements for the given employees. Employees without a
    /// placement are absent from the map.
    async fn placements(
        &self,
        organization_id: Uuid,
        employee_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, JobPlacement>>;
}
