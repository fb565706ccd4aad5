//! REST API module for the evaluation workflow.
//!
//! Routers are grouped per concern and share one `WorkflowState`. Caller
//! identity arrives in forwarded headers set by the upstream auth gateway
//! (`x-user-id`, `x-organization-id`, `x-role`); session issuance itself is
//! external to this core.

pub mod analytics_routes;
pub mod evaluation_routes;

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::analytics::GapAnalysisService;
use crate::error::WorkflowError;
use crate::lifecycle::EvaluationEngine;
use crate::models::{CallerContext, Role};

pub use analytics_routes::create_analytics_router;
pub use evaluation_routes::create_evaluation_router;

/// Shared application state for the evaluation API.
#[derive(Clone)]
pub struct WorkflowState {
    pub engine: Arc<EvaluationEngine>,
    pub analytics: Arc<GapAnalysisService>,
}

/// Uniform response envelope.
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let status = match &self {
            WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
            WorkflowError::Forbidden { .. } => StatusCode::FORBIDDEN,
            WorkflowError::InvalidTransition { .. } => StatusCode::CONFLICT,
            WorkflowError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Infrastructure details stay in the logs, not on the wire.
        let message = match &self {
            WorkflowError::Storage(source) => {
                error!("storage failure: {source:?}");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ApiResponse::<serde_json::Value> {
            success: false,
            data: None,
            error: Some(message),
        });
        (status, body).into_response()
    }
}

fn header_uuid(parts: &Parts, name: &'static str) -> Result<Uuid, WorkflowError> {
    let raw = parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| WorkflowError::validation(format!("missing {name} header")))?;
    Uuid::parse_str(raw)
        .map_err(|_| WorkflowError::validation(format!("invalid {name} header")))
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = WorkflowError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_uuid(parts, "x-user-id")?;
        let organization_id = header_uuid(parts, "x-organization-id")?;
        let role: Role = parts
            .headers
            .get("x-role")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| WorkflowError::validation("missing x-role header"))?
            .parse()?;

        Ok(CallerContext::new(user_id, organization_id, role))
    }
}
