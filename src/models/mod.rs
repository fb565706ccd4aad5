//! Domain models for the evaluation workflow.

mod evaluation;

pub use evaluation::{
    AssessorAssignment, CallerContext, EvaluationInstance, EvaluationKind, EvaluationStatus,
    EvaluationType, JobPlacement, QuestionResponse, RatingEntry, RatingSide, Role,
};
