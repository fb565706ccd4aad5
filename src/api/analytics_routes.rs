//! Gap-analysis endpoints.
//!
//! ## Endpoints
//!
//! - `GET /api/analytics/gap` - per-dimension self/assessor rating gaps
//!
//! ## Query Parameters
//!
//! - `granularity` (required): `organization`, `department`, `job_role`,
//!   or `instance`
//! - `kind` (required): `COMPETENCY` or `APPRAISAL`
//! - `cycle_id`, `employee_id`, `department_id`, `job_id` (optional):
//!   population narrowing
//!
//! ## Example
//!
//! ```text
//! GET /api/analytics/gap?granularity=department&kind=COMPETENCY
//! ```

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::analytics::{GapAnalysis, Granularity, PopulationFilter};
use crate::error::WorkflowResult;
use crate::models::{CallerContext, EvaluationKind};

use super::{ApiResponse, WorkflowState};

#[derive(Debug, Deserialize)]
pub struct GapQuery {
    pub granularity: String,
    pub kind: EvaluationKind,
    pub cycle_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
}

async fn compute_gap(
    Query(query): Query<GapQuery>,
    State(state): State<WorkflowState>,
    caller: CallerContext,
) -> WorkflowResult<Json<ApiResponse<GapAnalysis>>> {
    let granularity: Granularity = query.granularity.parse()?;
    let filter = PopulationFilter {
        kind: query.kind,
        cycle_id: query.cycle_id,
        employee_id: query.employee_id,
        department_id: query.department_id,
        job_id: query.job_id,
    };

    let analysis = state
        .analytics
        .compute_gap_analysis(&caller, &filter, granularity)
        .await?;
    Ok(ApiResponse::ok(analysis))
}

/// Create router for analytics endpoints
pub fn create_analytics_router(state: WorkflowState) -> Router {
    Router::new()
        .route("/api/analytics/gap", get(compute_gap))
        .with_state(state)
}
