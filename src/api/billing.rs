use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::middleware::AuthUser;
use super::{ApiError, ApiResponse, AppState, BillingHistoryDto, PaymentDto, UserDto};
use crate::models::{BillingStatus, CycleType};

#[derive(Deserialize)]
pub struct AddPaymentBody {
    pub cycle: String,
    pub amount: f64,
    pub memo: Option<String>,
}

#[derive(Deserialize)]
pub struct StartCycleBody {
    pub cycle: String,
    pub start_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct TrialBody {
    pub hours: i64,
}

/// GET /billing/{user_id}/status
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<BillingStatus>>, ApiError> {
    let status = state.billing().status(user_id).await?;
    Ok(Json(ApiResponse::success(status)))
}

/// GET /billing/{user_id}/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<BillingHistoryDto>>>, ApiError> {
    let rows = state
        .store()
        .billing_repo()
        .history_for_user(user_id)
        .await?;

    Ok(Json(ApiResponse::success(
        rows.into_iter().map(BillingHistoryDto::from).collect(),
    )))
}

/// GET /billing/{user_id}/payments
pub async fn payments(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<PaymentDto>>>, ApiError> {
    let rows = state.billing().payments(user_id).await?;

    Ok(Json(ApiResponse::success(
        rows.into_iter().map(PaymentDto::from).collect(),
    )))
}

/// POST /billing/{user_id}/payments
///
/// Records a payment and extends the cycle. Deliberately does not
/// re-enable a disabled account; that stays an explicit operator action.
pub async fn add_payment(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(user_id): Path<i32>,
    Json(payload): Json<AddPaymentBody>,
) -> Result<Json<ApiResponse<PaymentDto>>, ApiError> {
    let cycle = CycleType::from_str(&payload.cycle).map_err(ApiError::validation)?;

    let payment = state
        .billing()
        .add_payment(user_id, cycle, payload.amount, payload.memo, actor.id)
        .await?;

    audit(
        &state,
        actor.id,
        "billing.add_payment",
        user_id,
        Some(serde_json::json!({ "amount": payload.amount, "cycle": cycle.as_str() })),
    )
    .await;

    Ok(Json(ApiResponse::success(payment.into())))
}

/// POST /billing/{user_id}/start-cycle
pub async fn start_cycle(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(user_id): Path<i32>,
    Json(payload): Json<StartCycleBody>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let cycle = CycleType::from_str(&payload.cycle).map_err(ApiError::validation)?;

    let user = state
        .billing()
        .start_cycle(user_id, cycle, payload.start_date)
        .await?;

    audit(
        &state,
        actor.id,
        "billing.start_cycle",
        user_id,
        Some(serde_json::json!({ "cycle": cycle.as_str() })),
    )
    .await;

    Ok(Json(ApiResponse::success(user.into())))
}

/// POST /billing/{user_id}/trial
pub async fn set_trial(
    State(state): State<Arc<AppState>>,
    Extension(actor): Extension<AuthUser>,
    Path(user_id): Path<i32>,
    Json(payload): Json<TrialBody>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state.billing().set_trial(user_id, payload.hours).await?;

    audit(
        &state,
        actor.id,
        "billing.set_trial",
        user_id,
        Some(serde_json::json!({ "hours": payload.hours })),
    )
    .await;

    Ok(Json(ApiResponse::success(user.into())))
}

async fn audit(
    state: &Arc<AppState>,
    actor_id: i32,
    action: &str,
    user_id: i32,
    metadata: Option<serde_json::Value>,
) {
    if let Err(e) = state
        .store()
        .audit_repo()
        .record(actor_id, action, "user", Some(user_id.to_string()), metadata)
        .await
    {
        debug!(action, "Failed to record audit entry: {}", e);
    }
}
