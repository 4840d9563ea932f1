pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers as interview;
use crate::pipeline::handlers as analysis;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Analysis
        .route("/analyze", post(analysis::handle_analyze))
        .route("/analysis/:id", get(analysis::handle_get_analysis))
        // Interview
        .route(
            "/interview/generate",
            post(interview::handle_generate_interview),
        )
        .route("/interview/followup", post(interview::handle_followup))
        .route("/interview/:id", get(interview::handle_get_interview))
        // Feedback
        .route(
            "/feedback/analyze",
            post(interview::handle_analyze_feedback),
        )
        .route("/feedback/:id", get(interview::handle_get_feedback))
        .with_state(state)
}
