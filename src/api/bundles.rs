use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::middleware::AuthUser;
use super::{
    ApiError, ApiResponse, AppState, BundleDto, BundleEventDto, BundleStatsDto, LimitQuery,
    MessageResponse, ProxyHandoffDto,
};
use crate::models::BundleStatus;
use crate::storage::PresignedRequest;

#[derive(Deserialize)]
pub struct CompleteUploadBody {
    pub checksum: Option<String>,
    pub file_size_bytes: Option<i64>,
}

#[derive(Deserialize)]
pub struct BundleEventBody {
    pub level: String,
    pub message: String,
    pub context: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct CreateBundleBody {
    pub name: String,
}

#[derive(Deserialize)]
pub struct UpdateBundleBody {
    pub status: Option<String>,
    pub bundle_key: Option<String>,
    pub domain_id: Option<i32>,
    pub proxy_id: Option<i32>,
}

/// GET /sessions/my-sessions
///
/// Returns the shared bundle masquerading as assigned to the caller,
/// lazily creating the pending row on first read. The egress proxy
/// credentials ride along so the client can configure itself.
pub async fn my_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<BundleDto>>>, ApiError> {
    let bundle = state.bundles().shared_bundle().await?;

    let proxy = {
        let config = state.config().read().await;
        if config.proxy.is_configured() {
            Some(ProxyHandoffDto {
                host: config.proxy.host.clone(),
                port: config.proxy.port,
                username: config.proxy.username.clone(),
                password: config.proxy.password.clone(),
            })
        } else {
            None
        }
    };

    let mut dto = BundleDto::from(bundle);
    dto.assigned_to = Some(user.id);
    dto.proxy = proxy;

    Ok(Json(ApiResponse::success(vec![dto])))
}

/// GET /sessions/shared-stats
pub async fn shared_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<BundleStatsDto>>, ApiError> {
    let bundle = state.bundles().shared_bundle().await?;
    Ok(Json(ApiResponse::success(bundle.into())))
}

/// POST /sessions/{id}/request-upload
pub async fn request_upload(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<PresignedRequest>>, ApiError> {
    let presigned = state.bundles().request_upload(id).await?;

    audit(&state, user.id, "bundle.request_upload", id, None).await;

    Ok(Json(ApiResponse::success(presigned)))
}

/// POST /sessions/{id}/complete-upload
pub async fn complete_upload(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<CompleteUploadBody>,
) -> Result<Json<ApiResponse<BundleDto>>, ApiError> {
    let bundle = state
        .bundles()
        .complete_upload(id, payload.checksum, payload.file_size_bytes)
        .await?;

    audit(
        &state,
        user.id,
        "bundle.complete_upload",
        id,
        Some(serde_json::json!({ "version": bundle.bundle_version })),
    )
    .await;

    Ok(Json(ApiResponse::success(bundle.into())))
}

/// POST /sessions/{id}/request-download
pub async fn request_download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<PresignedRequest>>, ApiError> {
    let presigned = state.bundles().request_download(id).await?;
    Ok(Json(ApiResponse::success(presigned)))
}

/// POST /sessions/{id}/mark-ready
pub async fn mark_ready(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<BundleDto>>, ApiError> {
    let bundle = state.bundles().mark_ready(id).await?;

    audit(&state, user.id, "bundle.mark_ready", id, None).await;

    Ok(Json(ApiResponse::success(bundle.into())))
}

/// POST /sessions/{id}/events
pub async fn report_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<BundleEventBody>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::validation("Event message is required"));
    }

    state
        .bundles()
        .report_event(id, user.id, &payload.level, &payload.message, payload.context)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Event recorded",
    ))))
}

/// GET /sessions/{id}/events
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<BundleEventDto>>>, ApiError> {
    let events = state
        .store()
        .bundle_repo()
        .events(id, query.limit.unwrap_or(100))
        .await?;

    Ok(Json(ApiResponse::success(
        events.into_iter().map(BundleEventDto::from).collect(),
    )))
}

/// GET /sessions
pub async fn list_bundles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<BundleDto>>>, ApiError> {
    let bundles = state.store().bundle_repo().list().await?;

    Ok(Json(ApiResponse::success(
        bundles.into_iter().map(BundleDto::from).collect(),
    )))
}

/// POST /sessions
pub async fn create_bundle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateBundleBody>,
) -> Result<Json<ApiResponse<BundleDto>>, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Bundle name is required"));
    }

    let bundle = state.store().bundle_repo().create(name).await?;

    audit(&state, user.id, "bundle.create", bundle.id, None).await;

    Ok(Json(ApiResponse::success(bundle.into())))
}

/// GET /sessions/{id}
pub async fn get_bundle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<BundleDto>>, ApiError> {
    let bundle = state.bundles().get(id).await?;
    Ok(Json(ApiResponse::success(bundle.into())))
}

/// PATCH /sessions/{id}
pub async fn update_bundle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateBundleBody>,
) -> Result<Json<ApiResponse<BundleDto>>, ApiError> {
    state.bundles().get(id).await?;

    let status = match payload.status.as_deref() {
        Some(raw) => Some(BundleStatus::from_str(raw).map_err(ApiError::validation)?),
        None => None,
    };

    let bundle = state
        .store()
        .bundle_repo()
        .update(
            id,
            status,
            payload.bundle_key.map(Some),
            payload.domain_id.map(Some),
            payload.proxy_id.map(Some),
        )
        .await?;

    audit(&state, user.id, "bundle.update", id, None).await;

    Ok(Json(ApiResponse::success(bundle.into())))
}

/// DELETE /sessions/{id}
pub async fn delete_bundle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let deleted = state.store().bundle_repo().delete(id).await?;

    if !deleted {
        return Err(ApiError::not_found("Bundle", id));
    }

    audit(&state, user.id, "bundle.delete", id, None).await;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Bundle deleted",
    ))))
}

async fn audit(
    state: &Arc<AppState>,
    actor_id: i32,
    action: &str,
    bundle_id: i32,
    metadata: Option<serde_json::Value>,
) {
    if let Err(e) = state
        .store()
        .audit_repo()
        .record(
            actor_id,
            action,
            "bundle",
            Some(bundle_id.to_string()),
            metadata,
        )
        .await
    {
        debug!(action, "Failed to record audit entry: {}", e);
    }
}
