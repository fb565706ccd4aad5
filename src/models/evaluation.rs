//! Core data structures for evaluation instances, ratings, and appraisal
//! responses.
//!
//! An `EvaluationInstance` is one self- or assessor-side pass through the
//! competency or appraisal workflow for one employee. Competency ratings are
//! owned by their instance; appraisal responses are shared comparison
//! records keyed by (employee, cycle, question), written into from both
//! sides.
//!
//! ## Status lifecycle
//!
//! ```text
//! PENDING ──start──► IN_PROGRESS ──complete──► COMPLETED ──review──► REVIEWED
//! ```
//!
//! Transitions are validated here as pure functions; persistence and side
//! effects (fan-out) live in the lifecycle engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};

/// Which side of the evaluation produced an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "evaluation_type"))]
pub enum EvaluationType {
    /// The employee evaluating themselves.
    #[serde(rename = "SELF")]
    #[cfg_attr(feature = "database", sqlx(rename = "SELF"))]
    SelfReview,

    /// An assessor evaluating the employee.
    #[serde(rename = "ASSESSOR")]
    #[cfg_attr(feature = "database", sqlx(rename = "ASSESSOR"))]
    Assessor,
}

/// The two evaluation shapes the workflow drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(
    feature = "database",
    sqlx(type_name = "evaluation_kind", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum EvaluationKind {
    /// Competency-based assessment: per-competency rating entries owned by
    /// the instance.
    Competency,

    /// Fixed-question performance appraisal: shared per-question response
    /// rows written by both sides.
    Appraisal,
}

/// Lifecycle status of an evaluation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(
    feature = "database",
    sqlx(type_name = "evaluation_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationStatus {
    Pending,
    InProgress,
    Completed,
    Reviewed,
}

impl std::fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationStatus::Pending => write!(f, "PENDING"),
            EvaluationStatus::InProgress => write!(f, "IN_PROGRESS"),
            EvaluationStatus::Completed => write!(f, "COMPLETED"),
            EvaluationStatus::Reviewed => write!(f, "REVIEWED"),
        }
    }
}

impl EvaluationStatus {
    /// Whether ratings written to the instance have been locked in.
    pub fn is_settled(&self) -> bool {
        matches!(self, EvaluationStatus::Completed | EvaluationStatus::Reviewed)
    }
}

/// Caller role as resolved by the external auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Employee,
    Assessor,
    Hr,
}

impl std::str::FromStr for Role {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EMPLOYEE" => Ok(Role::Employee),
            "ASSESSOR" => Ok(Role::Assessor),
            "HR" => Ok(Role::Hr),
            other => Err(WorkflowError::validation(format!(
                "unknown role '{other}'"
            ))),
        }
    }
}

/// Identity of the caller performing an operation. Produced by the
/// external auth layer; every operation is scoped to `organization_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}

impl CallerContext {
    pub fn new(user_id: Uuid, organization_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            organization_id,
            role,
        }
    }
}

/// One self- or assessor-side pass through the evaluation workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct EvaluationInstance {
    pub evaluation_id: Uuid,
    pub organization_id: Uuid,
    /// The subject being evaluated.
    pub employee_id: Uuid,
    /// Populated iff `evaluation_type` is ASSESSOR.
    pub assessor_id: Option<Uuid>,
    pub evaluation_type: EvaluationType,
    pub kind: EvaluationKind,
    pub status: EvaluationStatus,
    /// The review period / appraisal cycle this instance belongs to.
    /// Cycle management is external; the id scopes the uniqueness keys.
    pub cycle_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EvaluationInstance {
    /// Create a new PENDING self evaluation.
    pub fn new_self(
        organization_id: Uuid,
        employee_id: Uuid,
        kind: EvaluationKind,
        cycle_id: Uuid,
    ) -> Self {
        Self {
            evaluation_id: Uuid::new_v4(),
            organization_id,
            employee_id,
            assessor_id: None,
            evaluation_type: EvaluationType::SelfReview,
            kind,
            status: EvaluationStatus::Pending,
            cycle_id,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Create a new PENDING assessor evaluation for an employee.
    pub fn new_assessor(
        organization_id: Uuid,
        employee_id: Uuid,
        assessor_id: Uuid,
        kind: EvaluationKind,
        cycle_id: Uuid,
    ) -> Self {
        Self {
            evaluation_id: Uuid::new_v4(),
            organization_id,
            employee_id,
            assessor_id: Some(assessor_id),
            evaluation_type: EvaluationType::Assessor,
            kind,
            status: EvaluationStatus::Pending,
            cycle_id,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_self(&self) -> bool {
        self.evaluation_type == EvaluationType::SelfReview
    }

    /// Whether ratings may still be written to this instance.
    pub fn accepts_ratings(&self) -> bool {
        !self.status.is_settled()
    }

    /// Transition: PENDING → IN_PROGRESS.
    ///
    /// Re-invoking on an instance already IN_PROGRESS is a no-op, not an
    /// error; the status is set again and `started_at` is kept.
    pub fn start(&self) -> WorkflowResult<Self> {
        match self.status {
            EvaluationStatus::Pending | EvaluationStatus::InProgress => {
                let mut next = self.clone();
                next.status = EvaluationStatus::InProgress;
                if next.started_at.is_none() {
                    next.started_at = Some(Utc::now());
                }
                Ok(next)
            }
            from => Err(WorkflowError::InvalidTransition {
                from,
                action: "start",
            }),
        }
    }

    /// Transition into COMPLETED.
    ///
    /// Legal from any state. The returned flag is true when this call
    /// crossed a SELF instance into COMPLETED for the first time, i.e. when
    /// assessor fan-out must run. Repeated completion calls keep the flag
    /// false so fan-out never fires twice for one instance.
    pub fn complete(&self) -> WorkflowResult<(Self, bool)> {
        let already_settled = self.status.is_settled();
        let mut next = self.clone();
        next.status = EvaluationStatus::Completed;
        if next.completed_at.is_none() {
            next.completed_at = Some(Utc::now());
        }
        let fan_out = self.is_self() && !already_settled;
        Ok((next, fan_out))
    }

    /// Transition: COMPLETED → REVIEWED.
    ///
    /// Idempotent from REVIEWED; illegal before completion.
    pub fn review(&self) -> WorkflowResult<Self> {
        match self.status {
            EvaluationStatus::Completed | EvaluationStatus::Reviewed => {
                let mut next = self.clone();
                next.status = EvaluationStatus::Reviewed;
                Ok(next)
            }
            from => Err(WorkflowError::InvalidTransition {
                from,
                action: "review",
            }),
        }
    }

    /// Identifier for logging/display.
    pub fn identifier(&self) -> String {
        format!("{:?}/{:?}[{}]", self.kind, self.evaluation_type, self.evaluation_id)
    }
}

/// A single competency rating, owned by exactly one evaluation instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct RatingEntry {
    pub rating_id: Uuid,
    pub evaluation_id: Uuid,
    pub competency_id: Uuid,
    /// Integer rating on the 1..=5 scale.
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RatingEntry {
    pub fn new(
        evaluation_id: Uuid,
        competency_id: Uuid,
        rating: i16,
        comment: Option<String>,
    ) -> Self {
        Self {
            rating_id: Uuid::new_v4(),
            evaluation_id,
            competency_id,
            rating,
            comment,
            created_at: Utc::now(),
        }
    }
}

/// Which side of a shared appraisal response a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RatingSide {
    /// Self-reported by the employee.
    Employee,
    /// Reported by an assessor.
    Assessor,
}

/// Shared appraisal response record for one question about one employee in
/// one cycle. Both the SELF and ASSESSOR instances resolve to this row;
/// each side may only write its own columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct QuestionResponse {
    pub response_id: Uuid,
    pub organization_id: Uuid,
    pub employee_id: Uuid,
    pub cycle_id: Uuid,
    pub question_id: Uuid,
    pub employee_rating: Option<i16>,
    pub employee_comment: Option<String>,
    pub assessor_rating: Option<i16>,
    pub assessor_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Curated (assessor, employee) pairing. Scopes appraisal fan-out and the
/// assessor's review visibility into self assessments. Read-only here;
/// assignment CRUD is external.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct AssessorAssignment {
    pub organization_id: Uuid,
    pub assessor_id: Uuid,
    pub employee_id: Uuid,
}

/// An employee's current job placement, resolved at query time through the
/// org directory for department/job-role gap aggregation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct JobPlacement {
    pub job_id: Uuid,
    pub department_id: Uuid,
}
