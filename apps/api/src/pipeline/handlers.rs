use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::analysis::{AnalysisInput, AnalysisRecord, AnalysisRequest, AnalysisResponse};
use crate::state::AppState;

/// POST /analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let response = state
        .orchestrator
        .run_analysis(&user.user_id, AnalysisInput::from(req))
        .await?;
    Ok(Json(response))
}

/// GET /analysis/:id
pub async fn handle_get_analysis(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisRecord>, AppError> {
    let record = state.orchestrator.get_analysis(&user.user_id, id).await?;
    Ok(Json(record))
}
