//! Domain service for authentication and single-session enforcement.
//!
//! Owns the login pipeline, token refresh, and session teardown. Every
//! successful authentication is observable in login history and session
//! activity, and may fan out security alerts.

use serde::Serialize;
use thiserror::Error;

use crate::auth::{TokenError, TokenPair};
use crate::models::{Role, UserStatus};

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password. Deliberately one variant: the login
    /// endpoint must not reveal which it was.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is not active")]
    AccountInactive,

    #[error("Billing period has expired")]
    BillingExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::ExpiredToken,
            TokenError::Invalid | TokenError::Malformed => Self::InvalidToken,
        }
    }
}

/// Login input as received from the HTTP surface.
#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub mac_address: Option<String>,
    pub device_metadata: Option<serde_json::Value>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Public projection of a user, safe to return to callers.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub user: AuthenticatedUser,
    pub tokens: TokenPair,
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Runs the full login pipeline: status gate, password verify, billing
    /// gate, prior-session invalidation, token mint, state commit, and
    /// record/alert emission.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] for unknown emails and wrong
    /// passwords alike; [`AuthError::AccountInactive`] and
    /// [`AuthError::BillingExpired`] for the respective gates.
    async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, AuthError>;

    /// Rotates both tokens off a valid refresh token. The new access token
    /// becomes the user's current session token, displacing any other.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;

    /// Closes the session carrying `access_token` with reason `manual`.
    async fn logout(&self, user_id: i32, access_token: &str) -> Result<(), AuthError>;

    /// Administrative teardown of every active session for a user.
    /// Returns the number of sessions closed.
    async fn force_logout(&self, user_id: i32) -> Result<u64, AuthError>;
}
