use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::entities::session_activity;
use crate::models::LogoutReason;

pub struct SessionActivityRepository {
    conn: DatabaseConnection,
}

impl SessionActivityRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn active_for_user(&self, user_id: i32) -> Result<Vec<session_activity::Model>> {
        session_activity::Entity::find()
            .filter(session_activity::Column::UserId.eq(user_id))
            .filter(session_activity::Column::IsActive.eq(true))
            .order_by_desc(session_activity::Column::LoginAt)
            .all(&self.conn)
            .await
            .context("Failed to query active sessions")
    }

    pub async fn for_user(
        &self,
        user_id: i32,
        active_only: bool,
        limit: u64,
    ) -> Result<Vec<session_activity::Model>> {
        let mut query = session_activity::Entity::find()
            .filter(session_activity::Column::UserId.eq(user_id));

        if active_only {
            query = query.filter(session_activity::Column::IsActive.eq(true));
        }

        query
            .order_by_desc(session_activity::Column::LoginAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query session activity")
    }

    pub async fn count_active(&self, user_id: i32) -> Result<u64> {
        session_activity::Entity::find()
            .filter(session_activity::Column::UserId.eq(user_id))
            .filter(session_activity::Column::IsActive.eq(true))
            .count(&self.conn)
            .await
            .context("Failed to count active sessions")
    }

    /// Bump `last_activity_at` on the active row carrying this token.
    /// Callers treat failure as non-fatal.
    pub async fn touch(&self, user_id: i32, session_token: &str) -> Result<()> {
        let row = session_activity::Entity::find()
            .filter(session_activity::Column::UserId.eq(user_id))
            .filter(session_activity::Column::SessionToken.eq(session_token))
            .filter(session_activity::Column::IsActive.eq(true))
            .one(&self.conn)
            .await
            .context("Failed to query session for activity touch")?;

        if let Some(row) = row {
            let mut active: session_activity::ActiveModel = row.into();
            active.last_activity_at = Set(Utc::now());
            active.update(&self.conn).await?;
        }

        Ok(())
    }

    /// Close the active row carrying this token. Returns whether a row was
    /// closed.
    pub async fn close(
        &self,
        user_id: i32,
        session_token: &str,
        reason: LogoutReason,
    ) -> Result<bool> {
        let row = session_activity::Entity::find()
            .filter(session_activity::Column::UserId.eq(user_id))
            .filter(session_activity::Column::SessionToken.eq(session_token))
            .filter(session_activity::Column::IsActive.eq(true))
            .one(&self.conn)
            .await
            .context("Failed to query session for close")?;

        let Some(row) = row else {
            return Ok(false);
        };

        let mut active: session_activity::ActiveModel = row.into();
        active.is_active = Set(false);
        active.logout_at = Set(Some(Utc::now()));
        active.logout_reason = Set(Some(reason.as_str().to_string()));
        active.update(&self.conn).await?;

        Ok(true)
    }

    /// Close every active row for the user. Returns the number closed.
    pub async fn close_all(&self, user_id: i32, reason: LogoutReason) -> Result<u64> {
        let now = Utc::now();

        let result = session_activity::Entity::update_many()
            .filter(session_activity::Column::UserId.eq(user_id))
            .filter(session_activity::Column::IsActive.eq(true))
            .col_expr(session_activity::Column::IsActive, Expr::value(false))
            .col_expr(session_activity::Column::LogoutAt, Expr::value(now))
            .col_expr(
                session_activity::Column::LogoutReason,
                Expr::value(reason.as_str()),
            )
            .exec(&self.conn)
            .await
            .context("Failed to close sessions")?;

        Ok(result.rows_affected)
    }
}
