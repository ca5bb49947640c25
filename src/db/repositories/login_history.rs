use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::entities::login_history;
use crate::geo::Location;

/// One login attempt, ready to append. Location fields come from a
/// best-effort geolocation lookup and may be absent.
#[derive(Debug, Clone, Default)]
pub struct LoginAttempt {
    pub user_id: i32,
    pub email: String,
    pub ip: Option<String>,
    pub location: Option<Location>,
    pub device_fingerprint: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
}

pub struct LoginHistoryRepository {
    conn: DatabaseConnection,
}

impl LoginHistoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn record(&self, attempt: LoginAttempt) -> Result<()> {
        let (city, country, latitude, longitude) = match attempt.location {
            Some(loc) => (Some(loc.city), Some(loc.country), loc.latitude, loc.longitude),
            None => (None, None, None, None),
        };

        let row = login_history::ActiveModel {
            user_id: Set(attempt.user_id),
            email: Set(attempt.email),
            ip: Set(attempt.ip),
            city: Set(city),
            country: Set(country),
            latitude: Set(latitude),
            longitude: Set(longitude),
            device_fingerprint: Set(attempt.device_fingerprint),
            success: Set(attempt.success),
            failure_reason: Set(attempt.failure_reason),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        row.insert(&self.conn)
            .await
            .context("Failed to record login attempt")?;

        Ok(())
    }

    pub async fn for_user(&self, user_id: i32, limit: u64) -> Result<Vec<login_history::Model>> {
        login_history::Entity::find()
            .filter(login_history::Column::UserId.eq(user_id))
            .order_by_desc(login_history::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query login history")
    }

    /// Failed attempts for a user inside the trailing window, for
    /// failed-login alert severity escalation.
    pub async fn recent_failure_count(&self, user_id: i32, window_minutes: i64) -> Result<u64> {
        let since = Utc::now() - Duration::minutes(window_minutes);

        login_history::Entity::find()
            .filter(login_history::Column::UserId.eq(user_id))
            .filter(login_history::Column::Success.eq(false))
            .filter(login_history::Column::CreatedAt.gte(since))
            .count(&self.conn)
            .await
            .context("Failed to count recent login failures")
    }
}
