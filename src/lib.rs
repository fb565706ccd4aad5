//! HR-Eval - Competency Evaluation Workflow Core
//!
//! This crate drives self-assessments, assessor assessments, and
//! performance appraisals through a shared status lifecycle, fans
//! assessor work out when an employee finishes a self evaluation, and
//! computes rating-gap analytics comparing self-reported and
//! assessor-reported competency levels.
//!
//! ## Architecture
//! All operations flow through the evaluation engine:
//! load instance -> tenant scope -> access filter -> lifecycle transition
//! -> persist (completion atomically includes fan-out).
//!
//! Persistence and the platform directories sit behind traits in
//! [`store`]; an in-memory implementation backs the test suites and the
//! Postgres implementations live in [`database`] (feature `database`).

// Core error handling
pub mod error;

// Domain models: instances, ratings, responses, caller identity
pub mod models;

// Role-aware visibility and mutation rules
pub mod access;

// Lifecycle engine and assessor fan-out
pub mod lifecycle;

// Rating-gap analytics
pub mod analytics;

// Storage and directory seams + in-memory implementation
pub mod store;

// Database integration (when enabled)
#[cfg(feature = "database")]
pub mod database;

// REST API layer (when enabled)
#[cfg(feature = "server")]
pub mod api;

// Public re-exports for the common call paths
pub use access::TransitionAction;
pub use analytics::{
    reduce_gaps, DimensionGap, GapAnalysis, GapAnalysisService, GapGroup, GapScope, Granularity,
    PopulationFilter, RatingSample,
};
pub use error::{WorkflowError, WorkflowResult};
pub use lifecycle::{CompletionOutcome, EvaluationEngine, FanOutTrigger, ListQuery};
pub use models::{
    AssessorAssignment, CallerContext, EvaluationInstance, EvaluationKind, EvaluationStatus,
    EvaluationType, JobPlacement, QuestionResponse, RatingEntry, RatingSide, Role,
};
pub use store::{
    AssignmentDirectory, CreateOutcome, EvaluationFilter, EvaluationStore, MemoryStore,
    OrgDirectory, RatingStore, ResponseKey, UserDirectory,
};

// Database integration re-exports (when the database feature is enabled)
#[cfg(feature = "database")]
pub use database::{DatabaseConfig, DatabaseManager, PgDirectory, PgEvaluationStore, PgRatingStore};

// REST API re-exports (when the server feature is enabled)
#[cfg(feature = "server")]
pub use api::{create_analytics_router, create_evaluation_router, ApiResponse, WorkflowState};
