use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::middleware::AuthUser;
use super::{ApiError, ApiResponse, AppState, MessageResponse, UserDto};
use crate::models::{Role, UserStatus};

#[derive(Deserialize)]
pub struct CreateUserBody {
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserBody {
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateRoleBody {
    pub role: String,
}

#[derive(Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
}

#[derive(Deserialize)]
pub struct UpdatePasswordBody {
    pub password: String,
}

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    let users = state.store().user_repo().list().await?;

    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserDto::from).collect(),
    )))
}

/// POST /users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Json(payload): Json<CreateUserBody>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let email = payload.email.trim().to_lowercase();

    if !email.contains('@') {
        return Err(ApiError::validation("A valid email is required"));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }

    let role = match payload.role.as_deref() {
        Some(raw) => Role::from_str(raw).map_err(ApiError::validation)?,
        None => Role::User,
    };

    // Creating a peer or superior role is off the table, even for roots
    // creating roots: only operator-root may mint operators and above.
    if role >= actor.role && actor.role != Role::OperatorRoot {
        return Err(ApiError::Forbidden(
            "Cannot create a user at or above your own role".to_string(),
        ));
    }

    if state
        .store()
        .user_repo()
        .get_by_email(&email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(format!(
            "A user with email {email} already exists"
        )));
    }

    let password_hash = crate::auth::password::hash(&payload.password).await?;

    let user = state
        .store()
        .user_repo()
        .create(&email, &password_hash, role)
        .await?;

    audit(&state, actor.id, "user.create", user.id, None).await;

    Ok(Json(ApiResponse::success(user.into())))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state
        .store()
        .user_repo()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    Ok(Json(ApiResponse::success(user.into())))
}

/// PATCH /users/{id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserBody>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    state
        .store()
        .user_repo()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    if let Some(email) = payload.email {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(ApiError::validation("A valid email is required"));
        }

        if let Some(existing) = state.store().user_repo().get_by_email(&email).await? {
            if existing.id != id {
                return Err(ApiError::Conflict(format!(
                    "A user with email {email} already exists"
                )));
            }
        }

        state.store().user_repo().update_email(id, &email).await?;
    }

    let updated = state
        .store()
        .user_repo()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    audit(&state, actor.id, "user.update", id, None).await;

    Ok(Json(ApiResponse::success(updated.into())))
}

/// DELETE /users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user = state
        .store()
        .user_repo()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    guard_last_operator_root(&state, &user).await?;

    state.store().user_repo().delete(id).await?;

    audit(&state, actor.id, "user.delete", id, None).await;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "User deleted",
    ))))
}

/// PATCH /users/{id}/role
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateRoleBody>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let role = Role::from_str(&payload.role).map_err(ApiError::validation)?;

    let user = state
        .store()
        .user_repo()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    if role != Role::OperatorRoot {
        guard_last_operator_root(&state, &user).await?;
    }

    state.store().user_repo().update_role(id, role).await?;

    audit(
        &state,
        actor.id,
        "user.update_role",
        id,
        Some(serde_json::json!({ "role": role.as_str() })),
    )
    .await;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Role updated",
    ))))
}

/// PATCH /users/{id}/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateStatusBody>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let status = UserStatus::from_str(&payload.status).map_err(ApiError::validation)?;

    state
        .store()
        .user_repo()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    state.store().user_repo().update_status(id, status).await?;

    audit(
        &state,
        actor.id,
        "user.update_status",
        id,
        Some(serde_json::json!({ "status": status.as_str() })),
    )
    .await;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Status updated",
    ))))
}

/// PATCH /users/{id}/password
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdatePasswordBody>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if payload.password.len() < 8 {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }

    state
        .store()
        .user_repo()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    let password_hash = crate::auth::password::hash(&payload.password).await?;

    state
        .store()
        .user_repo()
        .set_password_hash(id, &password_hash)
        .await?;

    audit(&state, actor.id, "user.update_password", id, None).await;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password updated",
    ))))
}

/// POST /users/{id}/force-logout
pub async fn force_logout(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .store()
        .user_repo()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    let closed = state.auth_service().force_logout(id).await?;

    audit(
        &state,
        actor.id,
        "user.force_logout",
        id,
        Some(serde_json::json!({ "sessions_closed": closed })),
    )
    .await;

    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Closed {closed} session(s)"
    )))))
}

/// The deployment must never lose its last operator-root to a delete or a
/// demotion.
async fn guard_last_operator_root(
    state: &Arc<AppState>,
    user: &crate::entities::users::Model,
) -> Result<(), ApiError> {
    if user.role != Role::OperatorRoot.as_str() {
        return Ok(());
    }

    let roots = state.store().user_repo().count_operator_roots().await?;
    if roots <= 1 {
        return Err(ApiError::Conflict(
            "Cannot remove the last operator-root".to_string(),
        ));
    }

    Ok(())
}

async fn audit(
    state: &Arc<AppState>,
    actor_id: i32,
    action: &str,
    target_id: i32,
    metadata: Option<serde_json::Value>,
) {
    if let Err(e) = state
        .store()
        .audit_repo()
        .record(actor_id, action, "user", Some(target_id.to_string()), metadata)
        .await
    {
        debug!(action, "Failed to record audit entry: {}", e);
    }
}
