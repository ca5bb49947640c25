//! Security-alert emission.
//!
//! Alerts are plain inserts into the alert store: no dedup, no rate
//! limiting. Every emission is best-effort; a failed insert is logged and
//! the originating request proceeds.

use serde_json::json;
use tracing::warn;

use crate::db::Store;
use crate::entities::{session_activity, users};
use crate::geo::Location;
use crate::models::{AlertSeverity, AlertType};

/// Failed logins escalate to HIGH once this many failures land in the
/// trailing window.
const FAILED_LOGIN_HIGH_THRESHOLD: u64 = 5;
const FAILED_LOGIN_WINDOW_MINUTES: i64 = 15;

#[derive(Clone)]
pub struct AlertService {
    store: Store,
}

impl AlertService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn failed_login(&self, user: &users::Model, ip: Option<&str>) {
        let failures = match self
            .store
            .login_history_repo()
            .recent_failure_count(user.id, FAILED_LOGIN_WINDOW_MINUTES)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                warn!(user_id = user.id, "Failed to count login failures: {}", e);
                0
            }
        };

        let severity = if failures >= FAILED_LOGIN_HIGH_THRESHOLD {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };

        let metadata = json!({
            "email": user.email,
            "ip": ip,
            "recent_failures": failures,
        });

        self.emit(
            Some(user.id),
            AlertType::FailedLogin,
            severity,
            &format!("Failed login attempt for {}", user.email),
            metadata,
        )
        .await;
    }

    /// Attempts against emails that do not exist get a system-scoped alert
    /// (no user id) so brute-force sweeps stay traceable.
    pub async fn unknown_email(&self, email: &str, ip: Option<&str>) {
        let metadata = json!({ "email": email, "ip": ip });

        self.emit(
            None,
            AlertType::UnknownEmail,
            AlertSeverity::Low,
            &format!("Login attempt against unknown email {email}"),
            metadata,
        )
        .await;
    }

    pub async fn multiple_device_login(
        &self,
        user: &users::Model,
        previous: &session_activity::Model,
        new_device: Option<&str>,
        new_ip: Option<&str>,
    ) {
        let metadata = json!({
            "previous_device": previous.device_fingerprint,
            "previous_ip": previous.ip,
            "new_device": new_device,
            "new_ip": new_ip,
        });

        self.emit(
            Some(user.id),
            AlertType::MultipleDeviceLogin,
            AlertSeverity::Medium,
            &format!("{} logged in from a new device; the previous session was signed out", user.email),
            metadata,
        )
        .await;
    }

    pub async fn suspicious_location(
        &self,
        user: &users::Model,
        previous: &Location,
        current: &Location,
        distance_km: f64,
        elapsed_minutes: f64,
    ) {
        let metadata = json!({
            "previous_location": previous,
            "new_location": current,
            "distance_km": distance_km.round(),
            "elapsed_minutes": elapsed_minutes.round(),
        });

        self.emit(
            Some(user.id),
            AlertType::SuspiciousLocation,
            AlertSeverity::High,
            &format!(
                "{} travelled {:.0} km in {:.0} minutes ({} to {})",
                user.email, distance_km, elapsed_minutes, previous.pretty, current.pretty
            ),
            metadata,
        )
        .await;
    }

    async fn emit(
        &self,
        user_id: Option<i32>,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: &str,
        metadata: serde_json::Value,
    ) {
        if let Err(e) = self
            .store
            .alert_repo()
            .create(user_id, alert_type, severity, message, Some(metadata))
            .await
        {
            warn!(alert_type = %alert_type, "Failed to record security alert: {}", e);
        }
    }
}
