//! Evaluation workflow endpoints.
//!
//! ## Endpoints
//!
//! - `POST /api/evaluations/self` - open (or return) a self evaluation
//! - `POST /api/evaluations/assessor` - open (or return) an assessor evaluation
//! - `POST /api/evaluations/:id/start` - PENDING → IN_PROGRESS
//! - `POST /api/evaluations/:id/complete` - → COMPLETED, may fan out
//! - `POST /api/evaluations/:id/review` - COMPLETED → REVIEWED
//! - `POST /api/evaluations/:id/ratings` - submit a rating or response
//! - `GET  /api/evaluations` - list visible instances
//! - `GET  /api/evaluations/:id` - fetch one visible instance
//! - `GET  /api/evaluations/:id/ratings` - competency ratings read-back
//! - `GET  /api/evaluations/:id/responses` - appraisal responses read-back

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};
use crate::lifecycle::ListQuery;
use crate::models::{
    CallerContext, EvaluationInstance, EvaluationKind, EvaluationStatus, QuestionResponse,
    RatingEntry,
};

use super::{ApiResponse, WorkflowState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSelfRequest {
    pub employee_id: Uuid,
    pub kind: EvaluationKind,
    pub cycle_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CreateAssessorRequest {
    pub employee_id: Uuid,
    pub assessor_id: Uuid,
    pub kind: EvaluationKind,
    pub cycle_id: Uuid,
}

/// One submission endpoint covers both kinds: competency ratings carry
/// `competency_id`, appraisal responses carry `question_id`.
#[derive(Debug, Deserialize)]
pub struct SubmitRatingRequest {
    pub competency_id: Option<Uuid>,
    pub question_id: Option<Uuid>,
    pub rating: i16,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<EvaluationStatus>,
    pub kind: Option<EvaluationKind>,
    pub cycle_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub instance: EvaluationInstance,
    /// How many assessor evaluations this completion created.
    pub fanned_out: usize,
}

/// Either kind of submitted entry, for the shared submission endpoint.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SubmittedEntry {
    Rating(RatingEntry),
    Response(QuestionResponse),
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_self(
    State(state): State<WorkflowState>,
    caller: CallerContext,
    Json(request): Json<CreateSelfRequest>,
) -> WorkflowResult<Json<ApiResponse<EvaluationInstance>>> {
    let instance = state
        .engine
        .create_self_evaluation(&caller, request.employee_id, request.kind, request.cycle_id)
        .await?;
    Ok(ApiResponse::ok(instance))
}

async fn create_assessor(
    State(state): State<WorkflowState>,
    caller: CallerContext,
    Json(request): Json<CreateAssessorRequest>,
) -> WorkflowResult<Json<ApiResponse<EvaluationInstance>>> {
    let instance = state
        .engine
        .create_assessor_evaluation(
            &caller,
            request.employee_id,
            request.assessor_id,
            request.kind,
            request.cycle_id,
        )
        .await?;
    Ok(ApiResponse::ok(instance))
}

async fn start_evaluation(
    Path(evaluation_id): Path<Uuid>,
    State(state): State<WorkflowState>,
    caller: CallerContext,
) -> WorkflowResult<Json<ApiResponse<EvaluationInstance>>> {
    let instance = state.engine.start_evaluation(&caller, evaluation_id).await?;
    Ok(ApiResponse::ok(instance))
}

async fn complete_evaluation(
    Path(evaluation_id): Path<Uuid>,
    State(state): State<WorkflowState>,
    caller: CallerContext,
) -> WorkflowResult<Json<ApiResponse<CompletionResponse>>> {
    let outcome = state
        .engine
        .complete_evaluation(&caller, evaluation_id)
        .await?;
    Ok(ApiResponse::ok(CompletionResponse {
        instance: outcome.instance,
        fanned_out: outcome.fanned_out,
    }))
}

async fn review_evaluation(
    Path(evaluation_id): Path<Uuid>,
    State(state): State<WorkflowState>,
    caller: CallerContext,
) -> WorkflowResult<Json<ApiResponse<EvaluationInstance>>> {
    let instance = state
        .engine
        .review_evaluation(&caller, evaluation_id)
        .await?;
    Ok(ApiResponse::ok(instance))
}

async fn submit_rating(
    Path(evaluation_id): Path<Uuid>,
    State(state): State<WorkflowState>,
    caller: CallerContext,
    Json(request): Json<SubmitRatingRequest>,
) -> WorkflowResult<Json<ApiResponse<SubmittedEntry>>> {
    let entry = match (request.competency_id, request.question_id) {
        (Some(competency_id), None) => SubmittedEntry::Rating(
            state
                .engine
                .submit_rating(
                    &caller,
                    evaluation_id,
                    competency_id,
                    request.rating,
                    request.comment,
                )
                .await?,
        ),
        (None, Some(question_id)) => SubmittedEntry::Response(
            state
                .engine
                .submit_response(
                    &caller,
                    evaluation_id,
                    question_id,
                    request.rating,
                    request.comment,
                )
                .await?,
        ),
        _ => {
            return Err(WorkflowError::validation(
                "exactly one of competency_id or question_id is required",
            ));
        }
    };
    Ok(ApiResponse::ok(entry))
}

async fn get_evaluation(
    Path(evaluation_id): Path<Uuid>,
    State(state): State<WorkflowState>,
    caller: CallerContext,
) -> WorkflowResult<Json<ApiResponse<EvaluationInstance>>> {
    let instance = state.engine.get_evaluation(&caller, evaluation_id).await?;
    Ok(ApiResponse::ok(instance))
}

async fn list_evaluations(
    Query(params): Query<ListParams>,
    State(state): State<WorkflowState>,
    caller: CallerContext,
) -> WorkflowResult<Json<ApiResponse<Vec<EvaluationInstance>>>> {
    let query = ListQuery {
        status: params.status,
        kind: params.kind,
        cycle_id: params.cycle_id,
    };
    let instances = state.engine.list_evaluations(&caller, query).await?;
    Ok(ApiResponse::ok(instances))
}

async fn list_ratings(
    Path(evaluation_id): Path<Uuid>,
    State(state): State<WorkflowState>,
    caller: CallerContext,
) -> WorkflowResult<Json<ApiResponse<Vec<RatingEntry>>>> {
    let ratings = state
        .engine
        .ratings_for_evaluation(&caller, evaluation_id)
        .await?;
    Ok(ApiResponse::ok(ratings))
}

async fn list_responses(
    Path(evaluation_id): Path<Uuid>,
    State(state): State<WorkflowState>,
    caller: CallerContext,
) -> WorkflowResult<Json<ApiResponse<Vec<QuestionResponse>>>> {
    let responses = state
        .engine
        .responses_for_evaluation(&caller, evaluation_id)
        .await?;
    Ok(ApiResponse::ok(responses))
}

// ============================================================================
// Router
// ============================================================================

/// Create router for evaluation workflow endpoints
pub fn create_evaluation_router(state: WorkflowState) -> Router {
    Router::new()
        .route("/api/evaluations/self", post(create_self))
        .route("/api/evaluations/assessor", post(create_assessor))
        .route("/api/evaluations", get(list_evaluations))
        .route("/api/evaluations/:id", get(get_evaluation))
        .route("/api/evaluations/:id/start", post(start_evaluation))
        .route("/api/evaluations/:id/complete", post(complete_evaluation))
        .route("/api/evaluations/:id/review", post(review_evaluation))
        .route(
            "/api/evaluations/:id/ratings",
            post(submit_rating).get(list_ratings),
        )
        .route("/api/evaluations/:id/responses", get(list_responses))
        .with_state(state)
}
