//! Per-request authentication and authorization.
//!
//! Every protected endpoint passes through here: bearer verification,
//! user status and billing gates, the current-session comparison that
//! powers single-session enforcement, a best-effort activity touch, and
//! the role gate from the static policy table.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::{ApiError, AppState, policy};
use crate::auth::TokenError;
use crate::models::{Role, UserStatus};
use crate::services::BillingService;

/// Authenticated caller, inserted as a request extension for handlers.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
    pub role: Role,
    pub access_token: String,
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = extract_bearer(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    // Expiry maps to a distinct reason so the client knows to refresh
    // rather than log out.
    let claims = state.tokens().verify_access(&bearer).map_err(|e| match e {
        TokenError::Expired => ApiError::token_expired(),
        TokenError::Invalid | TokenError::Malformed => {
            ApiError::Unauthorized("Invalid token".to_string())
        }
    })?;

    let user_id: i32 = claims
        .sub
        .parse()
        .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?;

    let user = state
        .store()
        .user_repo()
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))?;

    if user.status != UserStatus::Active.as_str() {
        return Err(ApiError::Forbidden("Account is not active".to_string()));
    }

    if BillingService::status_for(&user, Utc::now()).is_expired() {
        return Err(ApiError::Forbidden(
            "Billing period has expired".to_string(),
        ));
    }

    // The displacement check: only the token recorded at the latest login
    // (or refresh) may act. This is what makes a displaced client's next
    // poll fail with a reason it can act on.
    match &user.current_session_token {
        Some(current) if *current == bearer => {}
        _ => return Err(ApiError::displaced()),
    }

    if let Err(e) = state
        .store()
        .session_activity_repo()
        .touch(user.id, &bearer)
        .await
    {
        debug!(user_id = user.id, "Failed to touch session activity: {}", e);
    }

    let role =
        Role::from_str(&user.role).map_err(|_| ApiError::internal("Unknown role on user row"))?;

    let required = policy::required_role(request.method(), request.uri().path());
    if role < required {
        return Err(ApiError::Forbidden(
            "Insufficient role for this operation".to_string(),
        ));
    }

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        email: user.email,
        role,
        access_token: bearer,
    });

    Ok(next.run(request).await)
}

pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get("Authorization")?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Request IP as reported by the edge. Forwarded headers are what the
/// deployment's reverse proxy sets; there is no socket address to fall
/// back on behind it.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded_for.to_str() {
            if let Some(first) = value.split(',').next() {
                let candidate = first.trim();
                if !candidate.is_empty() {
                    return Some(candidate.to_string());
                }
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
