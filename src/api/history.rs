use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::middleware::AuthUser;
use super::{ApiError, ApiResponse, AppState, LoginHistoryDto, SessionActivityDto};

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u64>,
    #[serde(default)]
    pub active_only: bool,
}

/// GET /history/logins — the caller's own login history.
pub async fn my_login_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<LoginHistoryDto>>>, ApiError> {
    login_history_for(state, user.id, query.limit.unwrap_or(50)).await
}

/// GET /users/{id}/history/logins — admin view.
pub async fn user_login_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<LoginHistoryDto>>>, ApiError> {
    login_history_for(state, id, query.limit.unwrap_or(50)).await
}

/// GET /activity/sessions — the caller's own session activity.
pub async fn my_session_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<SessionActivityDto>>>, ApiError> {
    session_activity_for(state, user.id, query.active_only, query.limit.unwrap_or(50)).await
}

/// GET /users/{id}/activity/sessions — admin view.
pub async fn user_session_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<SessionActivityDto>>>, ApiError> {
    session_activity_for(state, id, query.active_only, query.limit.unwrap_or(50)).await
}

async fn login_history_for(
    state: Arc<AppState>,
    user_id: i32,
    limit: u64,
) -> Result<Json<ApiResponse<Vec<LoginHistoryDto>>>, ApiError> {
    let rows = state
        .store()
        .login_history_repo()
        .for_user(user_id, limit)
        .await?;

    Ok(Json(ApiResponse::success(
        rows.into_iter().map(LoginHistoryDto::from).collect(),
    )))
}

async fn session_activity_for(
    state: Arc<AppState>,
    user_id: i32,
    active_only: bool,
    limit: u64,
) -> Result<Json<ApiResponse<Vec<SessionActivityDto>>>, ApiError> {
    let rows = state
        .store()
        .session_activity_repo()
        .for_user(user_id, active_only, limit)
        .await?;

    Ok(Json(ApiResponse::success(
        rows.into_iter().map(SessionActivityDto::from).collect(),
    )))
}
