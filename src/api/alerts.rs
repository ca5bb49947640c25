use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use super::{AlertDto, ApiError, ApiResponse, AppState, MessageResponse};
use crate::db::AlertFilter;
use crate::models::{AlertSeverity, AlertType};

#[derive(Deserialize)]
pub struct AlertQuery {
    pub user_id: Option<i32>,
    pub alert_type: Option<String>,
    pub severity: Option<String>,
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default)]
    pub include_dismissed: bool,
    pub limit: Option<u64>,
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread: u64,
}

#[derive(Serialize)]
pub struct AlertStatsResponse {
    pub by_severity: Vec<SeverityCount>,
    pub unread: u64,
}

#[derive(Serialize)]
pub struct SeverityCount {
    pub severity: String,
    pub count: u64,
}

/// GET /alerts
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertQuery>,
) -> Result<Json<ApiResponse<Vec<AlertDto>>>, ApiError> {
    let alert_type = match query.alert_type.as_deref() {
        Some(raw) => Some(AlertType::from_str(raw).map_err(ApiError::validation)?),
        None => None,
    };

    let severity = match query.severity.as_deref() {
        Some(raw) => match raw {
            "LOW" => Some(AlertSeverity::Low),
            "MEDIUM" => Some(AlertSeverity::Medium),
            "HIGH" => Some(AlertSeverity::High),
            "CRITICAL" => Some(AlertSeverity::Critical),
            other => return Err(ApiError::validation(format!("Unknown severity: {other}"))),
        },
        None => None,
    };

    let filter = AlertFilter {
        user_id: query.user_id,
        alert_type,
        severity,
        unread_only: query.unread_only,
        include_dismissed: query.include_dismissed,
        limit: query.limit,
    };

    let alerts = state.store().alert_repo().list(filter).await?;

    Ok(Json(ApiResponse::success(
        alerts.into_iter().map(AlertDto::from).collect(),
    )))
}

/// GET /alerts/unread-count
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<UnreadCountResponse>>, ApiError> {
    let unread = state.store().alert_repo().unread_count().await?;
    Ok(Json(ApiResponse::success(UnreadCountResponse { unread })))
}

/// GET /alerts/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<AlertStatsResponse>>, ApiError> {
    let by_severity = state
        .store()
        .alert_repo()
        .counts_by_severity()
        .await?
        .into_iter()
        .map(|(severity, count)| SeverityCount { severity, count })
        .collect();

    let unread = state.store().alert_repo().unread_count().await?;

    Ok(Json(ApiResponse::success(AlertStatsResponse {
        by_severity,
        unread,
    })))
}

/// POST /alerts/{id}/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if !state.store().alert_repo().mark_read(id).await? {
        return Err(ApiError::not_found("Alert", id));
    }

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Alert marked read",
    ))))
}

/// POST /alerts/{id}/dismiss
pub async fn dismiss(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if !state.store().alert_repo().dismiss(id).await? {
        return Err(ApiError::not_found("Alert", id));
    }

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Alert dismissed",
    ))))
}
