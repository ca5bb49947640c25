use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{
    audit_logs, billing_history, bundle_events, login_history, payments, security_alerts,
    session_activity, shared_bundles, users,
};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// User projection without the credential hash.
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub email: String,
    pub role: String,
    pub status: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub is_trial_active: bool,
    pub is_billing_active: bool,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub billing_cycle: Option<String>,
    pub billing_cycle_end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for UserDto {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            role: model.role,
            status: model.status,
            last_login_at: model.last_login_at,
            last_login_ip: model.last_login_ip,
            is_trial_active: model.is_trial_active,
            is_billing_active: model.is_billing_active,
            trial_end_date: model.trial_end_date,
            billing_cycle: model.billing_cycle,
            billing_cycle_end_date: model.billing_cycle_end_date,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BundleDto {
    pub id: i32,
    pub name: String,
    pub status: String,
    pub bundle_key: Option<String>,
    pub checksum: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub bundle_version: i64,
    pub domain_id: Option<i32>,
    pub proxy_id: Option<i32>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// For `my-sessions` the shared bundle masquerades as assigned to the
    /// caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyHandoffDto>,
}

impl From<shared_bundles::Model> for BundleDto {
    fn from(model: shared_bundles::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            status: model.status,
            bundle_key: model.bundle_key,
            checksum: model.checksum,
            file_size_bytes: model.file_size_bytes,
            bundle_version: model.bundle_version,
            domain_id: model.domain_id,
            proxy_id: model.proxy_id,
            last_synced_at: model.last_synced_at,
            created_at: model.created_at,
            assigned_to: None,
            proxy: None,
        }
    }
}

/// Egress proxy connection details handed to the desktop client.
#[derive(Debug, Serialize)]
pub struct ProxyHandoffDto {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct BundleStatsDto {
    pub bundle_version: i64,
    pub status: String,
    pub download_count: i64,
    pub file_size_bytes: Option<i64>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl From<shared_bundles::Model> for BundleStatsDto {
    fn from(model: shared_bundles::Model) -> Self {
        Self {
            bundle_version: model.bundle_version,
            status: model.status,
            download_count: model.download_count,
            file_size_bytes: model.file_size_bytes,
            last_synced_at: model.last_synced_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginHistoryDto {
    pub id: i64,
    pub user_id: i32,
    pub email: String,
    pub ip: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub device_fingerprint: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<login_history::Model> for LoginHistoryDto {
    fn from(model: login_history::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            email: model.email,
            ip: model.ip,
            city: model.city,
            country: model.country,
            device_fingerprint: model.device_fingerprint,
            success: model.success,
            failure_reason: model.failure_reason,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionActivityDto {
    pub id: i64,
    pub user_id: i32,
    pub device_fingerprint: Option<String>,
    pub ip: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub login_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub is_active: bool,
    pub logout_at: Option<DateTime<Utc>>,
    pub logout_reason: Option<String>,
}

impl From<session_activity::Model> for SessionActivityDto {
    fn from(model: session_activity::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            device_fingerprint: model.device_fingerprint,
            ip: model.ip,
            city: model.city,
            country: model.country,
            login_at: model.login_at,
            last_activity_at: model.last_activity_at,
            is_active: model.is_active,
            logout_at: model.logout_at,
            logout_reason: model.logout_reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AlertDto {
    pub id: i64,
    pub user_id: Option<i32>,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
    pub is_read: bool,
    pub is_dismissed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<security_alerts::Model> for AlertDto {
    fn from(model: security_alerts::Model) -> Self {
        let metadata = model
            .metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        Self {
            id: model.id,
            user_id: model.user_id,
            alert_type: model.alert_type,
            severity: model.severity,
            message: model.message,
            metadata,
            is_read: model.is_read,
            is_dismissed: model.is_dismissed,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentDto {
    pub id: i64,
    pub user_id: i32,
    pub amount: f64,
    pub cycle: String,
    pub payment_date: DateTime<Utc>,
    pub cycle_start_date: DateTime<Utc>,
    pub cycle_end_date: DateTime<Utc>,
    pub memo: Option<String>,
    pub created_by: i32,
}

impl From<payments::Model> for PaymentDto {
    fn from(model: payments::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            amount: model.amount,
            cycle: model.cycle,
            payment_date: model.payment_date,
            cycle_start_date: model.cycle_start_date,
            cycle_end_date: model.cycle_end_date,
            memo: model.memo,
            created_by: model.created_by,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BillingHistoryDto {
    pub id: i64,
    pub user_id: i32,
    pub event_type: String,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<billing_history::Model> for BillingHistoryDto {
    fn from(model: billing_history::Model) -> Self {
        let details = model
            .details
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        Self {
            id: model.id,
            user_id: model.user_id,
            event_type: model.event_type,
            details,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditLogDto {
    pub id: i64,
    pub actor_id: i32,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<audit_logs::Model> for AuditLogDto {
    fn from(model: audit_logs::Model) -> Self {
        let metadata = model
            .metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        Self {
            id: model.id,
            actor_id: model.actor_id,
            action: model.action,
            target_type: model.target_type,
            target_id: model.target_id,
            metadata,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BundleEventDto {
    pub id: i64,
    pub bundle_id: i32,
    pub user_id: i32,
    pub level: String,
    pub message: String,
    pub context: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<bundle_events::Model> for BundleEventDto {
    fn from(model: bundle_events::Model) -> Self {
        let context = model
            .context
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        Self {
            id: model.id,
            bundle_id: model.bundle_id,
            user_id: model.user_id,
            level: model.level,
            message: model.message,
            context,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u64>,
}
