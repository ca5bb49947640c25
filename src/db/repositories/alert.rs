use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::entities::security_alerts;
use crate::models::{AlertSeverity, AlertType};

#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub user_id: Option<i32>,
    pub alert_type: Option<AlertType>,
    pub severity: Option<AlertSeverity>,
    pub unread_only: bool,
    pub include_dismissed: bool,
    pub limit: Option<u64>,
}

pub struct AlertRepository {
    conn: DatabaseConnection,
}

impl AlertRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        user_id: Option<i32>,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<security_alerts::Model> {
        let row = security_alerts::ActiveModel {
            user_id: Set(user_id),
            alert_type: Set(alert_type.as_str().to_string()),
            severity: Set(severity.as_str().to_string()),
            message: Set(message.to_string()),
            metadata: Set(metadata.map(|m| m.to_string())),
            is_read: Set(false),
            is_dismissed: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        row.insert(&self.conn)
            .await
            .context("Failed to insert security alert")
    }

    pub async fn list(&self, filter: AlertFilter) -> Result<Vec<security_alerts::Model>> {
        let mut query = security_alerts::Entity::find();

        if let Some(user_id) = filter.user_id {
            query = query.filter(security_alerts::Column::UserId.eq(user_id));
        }
        if let Some(alert_type) = filter.alert_type {
            query = query.filter(security_alerts::Column::AlertType.eq(alert_type.as_str()));
        }
        if let Some(severity) = filter.severity {
            query = query.filter(security_alerts::Column::Severity.eq(severity.as_str()));
        }
        if filter.unread_only {
            query = query.filter(security_alerts::Column::IsRead.eq(false));
        }
        if !filter.include_dismissed {
            query = query.filter(security_alerts::Column::IsDismissed.eq(false));
        }

        query
            .order_by_desc(security_alerts::Column::CreatedAt)
            .limit(filter.limit.unwrap_or(100))
            .all(&self.conn)
            .await
            .context("Failed to query security alerts")
    }

    pub async fn unread_count(&self) -> Result<u64> {
        security_alerts::Entity::find()
            .filter(security_alerts::Column::IsRead.eq(false))
            .filter(security_alerts::Column::IsDismissed.eq(false))
            .count(&self.conn)
            .await
            .context("Failed to count unread alerts")
    }

    /// Per-severity totals for the admin badge.
    pub async fn counts_by_severity(&self) -> Result<Vec<(String, u64)>> {
        let mut counts = Vec::with_capacity(4);
        for severity in [
            AlertSeverity::Low,
            AlertSeverity::Medium,
            AlertSeverity::High,
            AlertSeverity::Critical,
        ] {
            let count = security_alerts::Entity::find()
                .filter(security_alerts::Column::Severity.eq(severity.as_str()))
                .filter(security_alerts::Column::IsDismissed.eq(false))
                .count(&self.conn)
                .await
                .context("Failed to count alerts by severity")?;
            counts.push((severity.as_str().to_string(), count));
        }

        Ok(counts)
    }

    /// Read flag is monotonic: this only ever flips false to true.
    pub async fn mark_read(&self, id: i64) -> Result<bool> {
        self.set_flag(id, true, false).await
    }

    pub async fn dismiss(&self, id: i64) -> Result<bool> {
        self.set_flag(id, false, true).await
    }

    async fn set_flag(&self, id: i64, read: bool, dismissed: bool) -> Result<bool> {
        let row = security_alerts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query alert")?;

        let Some(row) = row else {
            return Ok(false);
        };

        let mut active: security_alerts::ActiveModel = row.into();
        if read {
            active.is_read = Set(true);
        }
        if dismissed {
            active.is_dismissed = Set(true);
        }
        active.update(&self.conn).await?;

        Ok(true)
    }
}
