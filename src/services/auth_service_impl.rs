//! `SeaORM` implementation of the `AuthService` trait.
//!
//! Single-session enforcement runs inside one database transaction: prior
//! sessions go inactive, tokens are minted, and the user row and the new
//! session-activity row commit together. SQLite serializes writing
//! transactions, so concurrent logins by the same user commit in order and
//! the last committer owns `current_session_token`.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use crate::auth::{TokenCodec, TokenPair};
use crate::db::{LoginAttempt, Store};
use crate::entities::{session_activity, users};
use crate::geo::{self, GeoResolver, Location};
use crate::models::{LogoutReason, Role, UserStatus};
use crate::services::alerts::AlertService;
use crate::services::auth_service::{
    AuthError, AuthService, AuthenticatedUser, LoginOutcome, LoginRequest,
};
use crate::services::billing::BillingService;

pub struct SeaOrmAuthService {
    store: Store,
    tokens: TokenCodec,
    geo: Arc<dyn GeoResolver>,
    alerts: AlertService,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, tokens: TokenCodec, geo: Arc<dyn GeoResolver>) -> Self {
        let alerts = AlertService::new(store.clone());
        Self {
            store,
            tokens,
            geo,
            alerts,
        }
    }

    fn projection(user: &users::Model) -> Result<AuthenticatedUser, AuthError> {
        let role = Role::from_str(&user.role).map_err(AuthError::Internal)?;
        let status = UserStatus::from_str(&user.status).map_err(AuthError::Internal)?;

        Ok(AuthenticatedUser {
            id: user.id,
            email: user.email.clone(),
            role,
            status,
        })
    }

    async fn record_failure(&self, user: &users::Model, request: &LoginRequest, reason: &str) {
        let fingerprint = request
            .user_agent
            .as_deref()
            .map(|ua| geo::parse_device(ua).fingerprint());

        let attempt = LoginAttempt {
            user_id: user.id,
            email: request.email.clone(),
            ip: request.ip.clone(),
            location: None,
            device_fingerprint: fingerprint,
            success: false,
            failure_reason: Some(reason.to_string()),
        };

        if let Err(e) = self.store.login_history_repo().record(attempt).await {
            warn!(user_id = user.id, "Failed to record login failure: {}", e);
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, AuthError> {
        // Step 1: lookup & status gate. Attempts against unknown emails are
        // not written to login history (no user row to bind them to); they
        // surface as a system-scoped alert instead.
        let user = self
            .store
            .user_repo()
            .get_by_email(&request.email)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let Some(user) = user else {
            self.alerts
                .unknown_email(&request.email, request.ip.as_deref())
                .await;
            return Err(AuthError::InvalidCredentials);
        };

        if user.status != UserStatus::Active.as_str() {
            self.record_failure(&user, &request, "account_inactive").await;
            return Err(AuthError::AccountInactive);
        }

        // Step 2: password verify, with escalating failed-login alerts.
        let password_ok =
            crate::auth::password::verify(&request.password, &user.password_hash).await?;

        if !password_ok {
            self.record_failure(&user, &request, "bad_password").await;
            self.alerts.failed_login(&user, request.ip.as_deref()).await;
            return Err(AuthError::InvalidCredentials);
        }

        // Step 3: billing gate. Disabling expired accounts is the sweeper's
        // job, not ours; we only refuse to mint tokens.
        if BillingService::status_for(&user, Utc::now()).is_expired() {
            self.record_failure(&user, &request, "billing_expired").await;
            return Err(AuthError::BillingExpired);
        }

        // Device and location resolve outside the transaction; the
        // geolocation call may take seconds and may fail, and neither is a
        // reason to hold the user row.
        let device = request
            .user_agent
            .as_deref()
            .map(geo::parse_device)
            .map(|d| d.fingerprint());

        let location = match request.ip.as_deref() {
            Some(ip) => geo::resolve_location(self.geo.as_ref(), ip).await,
            None => None,
        };

        // Steps 4-6: invalidate prior sessions, mint, commit user state and
        // the new activity row atomically.
        let now = Utc::now();
        let role = Role::from_str(&user.role).map_err(AuthError::Internal)?;

        let txn = self.store.conn.begin().await?;

        let prior_sessions = session_activity::Entity::find()
            .filter(session_activity::Column::UserId.eq(user.id))
            .filter(session_activity::Column::IsActive.eq(true))
            .order_by_desc(session_activity::Column::LoginAt)
            .all(&txn)
            .await?;

        let previous_session = prior_sessions.first().cloned();

        if !prior_sessions.is_empty() {
            session_activity::Entity::update_many()
                .filter(session_activity::Column::UserId.eq(user.id))
                .filter(session_activity::Column::IsActive.eq(true))
                .col_expr(session_activity::Column::IsActive, Expr::value(false))
                .col_expr(session_activity::Column::LogoutAt, Expr::value(now))
                .col_expr(
                    session_activity::Column::LogoutReason,
                    Expr::value(LogoutReason::NewLogin.as_str()),
                )
                .exec(&txn)
                .await?;
        }

        let tokens = self.tokens.mint_pair(user.id, role)?;

        let mut user_update: users::ActiveModel = user.clone().into();
        user_update.last_login_at = Set(Some(now));
        user_update.last_login_ip = Set(request.ip.clone());
        user_update.current_session_token = Set(Some(tokens.access_token.clone()));
        user_update.updated_at = Set(now);
        user_update.update(&txn).await?;

        let (city, country, latitude, longitude) = match &location {
            Some(loc) => (
                Some(loc.city.clone()),
                Some(loc.country.clone()),
                loc.latitude,
                loc.longitude,
            ),
            None => (None, None, None, None),
        };

        let session_row = session_activity::ActiveModel {
            user_id: Set(user.id),
            session_token: Set(tokens.access_token.clone()),
            device_fingerprint: Set(device.clone()),
            ip: Set(request.ip.clone()),
            city: Set(city),
            country: Set(country),
            latitude: Set(latitude),
            longitude: Set(longitude),
            login_at: Set(now),
            last_activity_at: Set(now),
            is_active: Set(true),
            logout_at: Set(None),
            logout_reason: Set(None),
            ..Default::default()
        };
        session_row.insert(&txn).await?;

        txn.commit().await?;

        // Step 7: audit rows land after the critical commit; failures here
        // never fail the login.
        let attempt = LoginAttempt {
            user_id: user.id,
            email: request.email.clone(),
            ip: request.ip.clone(),
            location: location.clone(),
            device_fingerprint: device.clone(),
            success: true,
            failure_reason: None,
        };
        if let Err(e) = self.store.login_history_repo().record(attempt).await {
            warn!(user_id = user.id, "Failed to record login history: {}", e);
        }

        // Step 8: alerting, also best-effort.
        if let Some(previous) = &previous_session {
            self.alerts
                .multiple_device_login(&user, previous, device.as_deref(), request.ip.as_deref())
                .await;

            if let (Some(prev_lat), Some(prev_lon), Some(new_loc)) =
                (previous.latitude, previous.longitude, &location)
            {
                if let (Some(new_lat), Some(new_lon)) = (new_loc.latitude, new_loc.longitude) {
                    let distance_km = geo::haversine_km(prev_lat, prev_lon, new_lat, new_lon);
                    let elapsed_minutes =
                        (now - previous.last_activity_at).num_seconds() as f64 / 60.0;

                    if geo::is_suspicious_travel(distance_km, elapsed_minutes) {
                        let previous_location = Location {
                            city: previous.city.clone().unwrap_or_default(),
                            country: previous.country.clone().unwrap_or_default(),
                            latitude: previous.latitude,
                            longitude: previous.longitude,
                            pretty: match (&previous.city, &previous.country) {
                                (Some(city), Some(country)) => format!("{city}, {country}"),
                                _ => String::new(),
                            },
                        };

                        self.alerts
                            .suspicious_location(
                                &user,
                                &previous_location,
                                new_loc,
                                distance_km,
                                elapsed_minutes,
                            )
                            .await;
                    }
                }
            }
        }

        Ok(LoginOutcome {
            user: Self::projection(&user)?,
            tokens,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.tokens.verify_refresh(refresh_token)?;

        let user_id: i32 = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;

        let user = self
            .store
            .user_repo()
            .get_by_id(user_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        if user.status != UserStatus::Active.as_str() {
            return Err(AuthError::AccountInactive);
        }

        let role = Role::from_str(&user.role).map_err(AuthError::Internal)?;
        let tokens = self.tokens.mint_pair(user.id, role)?;
        let now = Utc::now();

        // The new access token displaces whatever token was current, and
        // the active session row keeps its identity across the rotation.
        let txn = self.store.conn.begin().await?;

        let mut user_update: users::ActiveModel = user.into();
        user_update.current_session_token = Set(Some(tokens.access_token.clone()));
        user_update.updated_at = Set(now);
        user_update.update(&txn).await?;

        session_activity::Entity::update_many()
            .filter(session_activity::Column::UserId.eq(user_id))
            .filter(session_activity::Column::IsActive.eq(true))
            .col_expr(
                session_activity::Column::SessionToken,
                Expr::value(tokens.access_token.clone()),
            )
            .col_expr(session_activity::Column::LastActivityAt, Expr::value(now))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        Ok(tokens)
    }

    async fn logout(&self, user_id: i32, access_token: &str) -> Result<(), AuthError> {
        self.store
            .session_activity_repo()
            .close(user_id, access_token, LogoutReason::Manual)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        self.store
            .user_repo()
            .clear_session_token(user_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(())
    }

    async fn force_logout(&self, user_id: i32) -> Result<u64, AuthError> {
        let closed = self
            .store
            .session_activity_repo()
            .close_all(user_id, LogoutReason::ForcedByAdmin)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        self.store
            .user_repo()
            .clear_session_token(user_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(closed)
    }
}
