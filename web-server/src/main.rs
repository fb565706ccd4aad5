use std::sync::Arc;

use axum::{response::Json, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use hr_eval::{
    create_analytics_router, create_evaluation_router, ApiResponse, DatabaseManager,
    EvaluationEngine, GapAnalysisService, WorkflowState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "hr_eval=info,hr_eval_web_server=info,tower_http=debug".into()),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Database connection and schema check
    let manager = DatabaseManager::with_default_config().await?;
    manager.verify_schema().await?;

    let evaluations = Arc::new(manager.evaluation_store());
    let ratings = Arc::new(manager.rating_store());
    let directory = Arc::new(manager.directory());

    let engine = Arc::new(EvaluationEngine::new(
        evaluations.clone(),
        ratings.clone(),
        directory.clone(),
        directory.clone(),
    ));
    let analytics = Arc::new(GapAnalysisService::new(
        evaluations,
        ratings,
        directory.clone(),
        directory,
    ));

    let state = WorkflowState { engine, analytics };

    // Build our application with routes
    let app = create_router(state);

    // Determine port
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);

    let addr = format!("0.0.0.0:{}", port);
    info!("Starting server on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: WorkflowState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .merge(create_evaluation_router(state.clone()))
        .merge(create_analytics_router(state))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

// Health check endpoint
async fn health_check() -> Json<ApiResponse<String>> {
    ApiResponse::ok("OK".to_string())
}
