use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::users;
use crate::models::{Role, UserStatus};

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by id")
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")
    }

    pub async fn list(&self) -> Result<Vec<users::Model>> {
        users::Entity::find()
            .order_by_asc(users::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list users")
    }

    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<users::Model> {
        let now = Utc::now();

        let user = users::ActiveModel {
            email: Set(email.to_string()),
            password_hash: Set(password_hash.to_string()),
            role: Set(role.as_str().to_string()),
            status: Set(UserStatus::Active.as_str().to_string()),
            is_trial_active: Set(false),
            is_billing_active: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        user.insert(&self.conn)
            .await
            .context("Failed to insert user")
    }

    pub async fn update_role(&self, id: i32, role: Role) -> Result<()> {
        let user = self.require(id).await?;

        let mut active: users::ActiveModel = user.into();
        active.role = Set(role.as_str().to_string());
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn update_status(&self, id: i32, status: UserStatus) -> Result<()> {
        let user = self.require(id).await?;

        let mut active: users::ActiveModel = user.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn set_password_hash(&self, id: i32, password_hash: &str) -> Result<()> {
        let user = self.require(id).await?;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(password_hash.to_string());
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn update_email(&self, id: i32, email: &str) -> Result<()> {
        let user = self.require(id).await?;

        let mut active: users::ActiveModel = user.into();
        active.email = Set(email.to_string());
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = users::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn clear_session_token(&self, id: i32) -> Result<()> {
        let user = self.require(id).await?;

        let mut active: users::ActiveModel = user.into();
        active.current_session_token = Set(None);
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn count_operator_roots(&self) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        users::Entity::find()
            .filter(users::Column::Role.eq(Role::OperatorRoot.as_str()))
            .count(&self.conn)
            .await
            .context("Failed to count operator-root users")
    }

    /// Users whose billing or trial window has lapsed and who are not yet
    /// disabled. Input to the expiration sweep.
    pub async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Status.ne(UserStatus::Disabled.as_str()))
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(users::Column::IsBillingActive.eq(true))
                            .add(users::Column::BillingCycleEndDate.lt(now)),
                    )
                    .add(
                        Condition::all()
                            .add(users::Column::IsTrialActive.eq(true))
                            .add(users::Column::TrialEndDate.lt(now)),
                    ),
            )
            .all(&self.conn)
            .await
            .context("Failed to query expired users")
    }

    async fn require(&self, id: i32) -> Result<users::Model> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))
    }
}
