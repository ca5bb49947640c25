use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, QuerySelect, Set};

use crate::entities::audit_logs;

pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn record(
        &self,
        actor_id: i32,
        action: &str,
        target_type: &str,
        target_id: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        let row = audit_logs::ActiveModel {
            actor_id: Set(actor_id),
            action: Set(action.to_string()),
            target_type: Set(target_type.to_string()),
            target_id: Set(target_id),
            metadata: Set(metadata.map(|m| m.to_string())),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        row.insert(&self.conn)
            .await
            .context("Failed to record audit entry")?;

        Ok(())
    }

    pub async fn list(&self, limit: u64) -> Result<Vec<audit_logs::Model>> {
        audit_logs::Entity::find()
            .order_by_desc(audit_logs::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list audit entries")
    }
}
