use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{billing_history, payments};
use crate::models::{BillingEvent, CycleType};

pub struct BillingRepository {
    conn: DatabaseConnection,
}

impl BillingRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_payment(
        &self,
        user_id: i32,
        amount: f64,
        cycle: CycleType,
        cycle_start: DateTime<Utc>,
        cycle_end: DateTime<Utc>,
        memo: Option<String>,
        created_by: i32,
    ) -> Result<payments::Model> {
        let now = Utc::now();

        let row = payments::ActiveModel {
            user_id: Set(user_id),
            amount: Set(amount),
            cycle: Set(cycle.as_str().to_string()),
            payment_date: Set(now),
            cycle_start_date: Set(cycle_start),
            cycle_end_date: Set(cycle_end),
            memo: Set(memo),
            created_by: Set(created_by),
            created_at: Set(now),
            ..Default::default()
        };

        row.insert(&self.conn)
            .await
            .context("Failed to insert payment")
    }

    pub async fn payments_for_user(&self, user_id: i32) -> Result<Vec<payments::Model>> {
        payments::Entity::find()
            .filter(payments::Column::UserId.eq(user_id))
            .order_by_desc(payments::Column::PaymentDate)
            .all(&self.conn)
            .await
            .context("Failed to query payments")
    }

    pub async fn record_event(
        &self,
        user_id: i32,
        event: BillingEvent,
        details: Option<String>,
    ) -> Result<()> {
        let row = billing_history::ActiveModel {
            user_id: Set(user_id),
            event_type: Set(event.as_str().to_string()),
            details: Set(details),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        row.insert(&self.conn)
            .await
            .context("Failed to record billing event")?;

        Ok(())
    }

    pub async fn history_for_user(&self, user_id: i32) -> Result<Vec<billing_history::Model>> {
        billing_history::Entity::find()
            .filter(billing_history::Column::UserId.eq(user_id))
            .order_by_desc(billing_history::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to query billing history")
    }
}
