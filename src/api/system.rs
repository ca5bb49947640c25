use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::middleware::AuthUser;
use super::{ApiError, ApiResponse, AppState, AuditLogDto, LimitQuery};
use crate::entities::{domains, proxies};

/// GET /healthz — open endpoint; degrades when the database is gone.
pub async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "uptime_seconds": state.start_time.elapsed().as_secs(),
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "status": "degraded" })),
            )
        }
    }
}

/// GET /audit
pub async fn list_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<AuditLogDto>>>, ApiError> {
    let rows = state
        .store()
        .audit_repo()
        .list(query.limit.unwrap_or(100))
        .await?;

    Ok(Json(ApiResponse::success(
        rows.into_iter().map(AuditLogDto::from).collect(),
    )))
}

#[derive(Deserialize)]
pub struct CreateDomainBody {
    pub name: String,
    pub base_url: String,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateProxyBody {
    pub host: String,
    pub port: i32,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

/// GET /domains
pub async fn list_domains(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, ApiError> {
    let rows = domains::Entity::find()
        .order_by_asc(domains::Column::Id)
        .all(&state.store().conn)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    Ok(Json(ApiResponse::success(
        rows.into_iter().map(domain_json).collect(),
    )))
}

/// POST /domains
pub async fn create_domain(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Json(payload): Json<CreateDomainBody>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if payload.name.trim().is_empty() || payload.base_url.trim().is_empty() {
        return Err(ApiError::validation("Domain name and base_url are required"));
    }

    let existing = domains::Entity::find()
        .filter(domains::Column::Name.eq(payload.name.trim()))
        .one(&state.store().conn)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    if existing.is_some() {
        return Err(ApiError::Conflict(format!(
            "Domain {} already exists",
            payload.name.trim()
        )));
    }

    let row = domains::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        base_url: Set(payload.base_url.trim().to_string()),
        notes: Set(payload.notes),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let created = row
        .insert(&state.store().conn)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    record_audit(&state, actor.id, "domain.create", &created.id.to_string()).await;

    Ok(Json(ApiResponse::success(domain_json(created))))
}

/// GET /proxies
pub async fn list_proxies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, ApiError> {
    let rows = proxies::Entity::find()
        .order_by_asc(proxies::Column::Id)
        .all(&state.store().conn)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    Ok(Json(ApiResponse::success(
        rows.into_iter().map(proxy_json).collect(),
    )))
}

/// POST /proxies
pub async fn create_proxy(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Json(payload): Json<CreateProxyBody>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if payload.host.trim().is_empty() || payload.port <= 0 {
        return Err(ApiError::validation("Proxy host and port are required"));
    }

    let row = proxies::ActiveModel {
        host: Set(payload.host.trim().to_string()),
        port: Set(payload.port),
        username: Set(payload.username),
        password: Set(payload.password),
        enabled: Set(payload.enabled),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let created = row
        .insert(&state.store().conn)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    record_audit(&state, actor.id, "proxy.create", &created.id.to_string()).await;

    Ok(Json(ApiResponse::success(proxy_json(created))))
}

fn domain_json(model: domains::Model) -> serde_json::Value {
    serde_json::json!({
        "id": model.id,
        "name": model.name,
        "base_url": model.base_url,
        "notes": model.notes,
        "created_at": model.created_at,
    })
}

fn proxy_json(model: proxies::Model) -> serde_json::Value {
    serde_json::json!({
        "id": model.id,
        "host": model.host,
        "port": model.port,
        "username": model.username,
        "enabled": model.enabled,
        "created_at": model.created_at,
    })
}

async fn record_audit(state: &Arc<AppState>, actor_id: i32, action: &str, target_id: &str) {
    if let Err(e) = state
        .store()
        .audit_repo()
        .record(actor_id, action, "catalog", Some(target_id.to_string()), None)
        .await
    {
        debug!(action, "Failed to record audit entry: {}", e);
    }
}
