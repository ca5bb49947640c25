use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::{AuthError, BillingError, BundleError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    ValidationError(String),

    Unauthorized(String),

    /// 401 with a stable machine-readable reason; the desktop client keys
    /// its self-logout on `logged_out_from_another_device`.
    SessionRejected {
        reason: &'static str,
        message: String,
    },

    Forbidden(String),

    Conflict(String),

    UpstreamError { service: String, message: String },

    DatabaseError(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::SessionRejected { reason, message } => {
                write!(f, "Session rejected ({reason}): {message}")
            }
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::UpstreamError { service, message } => write!(f, "{service} error: {message}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            Self::SessionRejected { reason, message } => {
                let body = serde_json::json!({
                    "success": false,
                    "error": message,
                    "reason": reason,
                });
                return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
            }
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::UpstreamError { service, message } => {
                tracing::warn!("{service} error: {message}");
                (StatusCode::BAD_GATEWAY, format!("{service} is unavailable"))
            }
            Self::DatabaseError(msg) => {
                tracing::error!("Database error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "A storage error occurred".to_string(),
                )
            }
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl ApiError {
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    #[must_use]
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        Self::NotFound(format!("{resource} {id} not found"))
    }

    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    #[must_use]
    pub fn displaced() -> Self {
        Self::SessionRejected {
            reason: "logged_out_from_another_device",
            message: "This session was signed out by a newer login".to_string(),
        }
    }

    #[must_use]
    pub fn token_expired() -> Self {
        Self::SessionRejected {
            reason: "token_expired",
            message: "Access token has expired".to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = ?err, "Internal Server Error");
        Self::InternalError("An unexpected internal error occurred".to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized("Invalid credentials".to_string()),
            AuthError::AccountInactive => Self::Forbidden("Account is not active".to_string()),
            AuthError::BillingExpired => {
                Self::Forbidden("Billing period has expired".to_string())
            }
            AuthError::InvalidToken | AuthError::UserNotFound => {
                Self::Unauthorized("Invalid token".to_string())
            }
            AuthError::ExpiredToken => Self::token_expired(),
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::UserNotFound => Self::NotFound("User not found".to_string()),
            BillingError::Validation(msg) => Self::ValidationError(msg),
            BillingError::Database(msg) => Self::DatabaseError(msg),
            BillingError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<BundleError> for ApiError {
    fn from(err: BundleError) -> Self {
        match err {
            BundleError::NotFound => Self::NotFound("Bundle not found".to_string()),
            BundleError::NotReady(status) => {
                Self::Conflict(format!("Bundle is not downloadable (status: {status})"))
            }
            BundleError::NoPendingUpload => {
                Self::Conflict("No upload was requested for this bundle".to_string())
            }
            BundleError::Validation(msg) => Self::ValidationError(msg),
            BundleError::Upstream(msg) => Self::UpstreamError {
                service: "Object store".to_string(),
                message: msg,
            },
            BundleError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}
