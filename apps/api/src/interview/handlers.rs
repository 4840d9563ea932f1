use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::interview::{
    FeedbackRequest, FeedbackResponse, FollowupRequest, FollowupResponse, InterviewRecord,
    InterviewRequest, InterviewResponse,
};
use crate::state::AppState;

/// POST /interview/generate
pub async fn handle_generate_interview(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<InterviewRequest>,
) -> Result<Json<InterviewResponse>, AppError> {
    let response = state
        .orchestrator
        .generate_interview_questions(&user.user_id, req.analysis_id)
        .await?;
    Ok(Json(response))
}

/// GET /interview/:id
pub async fn handle_get_interview(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InterviewRecord>, AppError> {
    Ok(Json(state.orchestrator.get_interview(&user.user_id, id).await?))
}

/// POST /interview/followup
/// Always 200 for an authenticated caller.
pub async fn handle_followup(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<FollowupRequest>,
) -> Json<FollowupResponse> {
    let followup_question = state
        .orchestrator
        .generate_followup(&user.user_id, req.interview_id, &req.conversation_history)
        .await;
    Json(FollowupResponse { followup_question })
}

/// POST /feedback/analyze
pub async fn handle_analyze_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let response = state
        .orchestrator
        .generate_feedback(&user.user_id, req.interview_id, &req.transcript)
        .await?;
    Ok(Json(response))
}

/// GET /feedback/:id
pub async fn handle_get_feedback(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FeedbackResponse>, AppError> {
    Ok(Json(state.orchestrator.get_feedback(&user.user_id, id).await?))
}
