use axum::{
    Extension, Json,
    extract::State,
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::middleware::{AuthUser, client_ip};
use super::{ApiError, ApiResponse, AppState, UserDto};
use crate::auth::TokenPair;
use crate::services::{LoginOutcome, LoginRequest};

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
    pub mac_address: Option<String>,
    pub device_metadata: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct RefreshBody {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub tokens: TokenPair,
}

#[derive(Serialize)]
pub struct SessionStatusResponse {
    pub valid: bool,
    pub user_id: i32,
}

/// POST /auth/login
///
/// The full pipeline lives in the auth service; the handler only shapes
/// I/O. Unknown emails and wrong passwords produce the same 401 body.
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<LoginBody>,
) -> Result<Json<ApiResponse<LoginOutcome>>, ApiError> {
    if payload.email.trim().is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let ip = client_ip(&headers);
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let request = LoginRequest {
        email: payload.email.trim().to_string(),
        password: payload.password,
        mac_address: payload.mac_address,
        device_metadata: payload.device_metadata,
        ip,
        user_agent,
    };

    let outcome = state.auth_service().login(request).await?;

    tracing::info!(user_id = outcome.user.id, email = %outcome.user.email, "Login succeeded");

    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RefreshBody>,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    if payload.refresh_token.is_empty() {
        return Err(ApiError::validation("Refresh token is required"));
    }

    let tokens = state.auth_service().refresh(&payload.refresh_token).await?;

    Ok(Json(ApiResponse::success(RefreshResponse { tokens })))
}

/// GET /auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let model = state
        .store()
        .user_repo()
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    Ok(Json(ApiResponse::success(model.into())))
}

/// GET /auth/session-status
///
/// Reaching the handler means the middleware accepted the token; the
/// interesting outcomes are its 401s.
pub async fn session_status(
    Extension(user): Extension<AuthUser>,
) -> Json<ApiResponse<SessionStatusResponse>> {
    Json(ApiResponse::success(SessionStatusResponse {
        valid: true,
        user_id: user.id,
    }))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<super::MessageResponse>>, ApiError> {
    state
        .auth_service()
        .logout(user.id, &user.access_token)
        .await?;

    Ok(Json(ApiResponse::success(super::MessageResponse::new(
        "Logged out",
    ))))
}
