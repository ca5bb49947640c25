use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};

use crate::entities::{bundle_events, shared_bundles};
use crate::models::BundleStatus;

pub struct BundleRepository {
    conn: DatabaseConnection,
}

impl BundleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<shared_bundles::Model>> {
        shared_bundles::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query bundle")
    }

    pub async fn list(&self) -> Result<Vec<shared_bundles::Model>> {
        shared_bundles::Entity::find()
            .order_by_asc(shared_bundles::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list bundles")
    }

    /// Fetch the bundle under the well-known name, creating a pending row
    /// on first read.
    pub async fn get_or_create(&self, name: &str) -> Result<shared_bundles::Model> {
        let existing = shared_bundles::Entity::find()
            .filter(shared_bundles::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query bundle by name")?;

        if let Some(bundle) = existing {
            return Ok(bundle);
        }

        self.create(name).await
    }

    pub async fn create(&self, name: &str) -> Result<shared_bundles::Model> {
        let now = Utc::now();

        let bundle = shared_bundles::ActiveModel {
            name: Set(name.to_string()),
            status: Set(BundleStatus::Pending.as_str().to_string()),
            bundle_version: Set(0),
            download_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        bundle
            .insert(&self.conn)
            .await
            .context("Failed to insert bundle")
    }

    /// Remember the upload key issued to the most recent request-upload
    /// caller. Does not advance the bundle state.
    pub async fn set_pending_key(&self, id: i32, key: &str) -> Result<()> {
        let bundle = self.require(id).await?;

        let mut active: shared_bundles::ActiveModel = bundle.into();
        active.pending_bundle_key = Set(Some(key.to_string()));
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Promote the pending key, bump the version, and move to ready, as one
    /// transaction. Last committer wins when uploads race.
    pub async fn complete_upload(
        &self,
        id: i32,
        checksum: Option<String>,
        file_size_bytes: Option<i64>,
    ) -> Result<shared_bundles::Model> {
        let txn = self.conn.begin().await?;

        let bundle = shared_bundles::Entity::find_by_id(id)
            .one(&txn)
            .await
            .context("Failed to query bundle for upload completion")?
            .ok_or_else(|| anyhow::anyhow!("Bundle not found: {id}"))?;

        let pending = bundle
            .pending_bundle_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("No upload was requested for bundle {id}"))?;

        let now = Utc::now();
        let version = bundle.bundle_version + 1;

        let mut active: shared_bundles::ActiveModel = bundle.into();
        active.bundle_key = Set(Some(pending));
        active.pending_bundle_key = Set(None);
        active.status = Set(BundleStatus::Ready.as_str().to_string());
        active.bundle_version = Set(version);
        active.checksum = Set(checksum);
        active.file_size_bytes = Set(file_size_bytes);
        active.last_synced_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        Ok(updated)
    }

    pub async fn set_status(&self, id: i32, status: BundleStatus) -> Result<()> {
        let bundle = self.require(id).await?;

        let mut active: shared_bundles::ActiveModel = bundle.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        &self,
        id: i32,
        status: Option<BundleStatus>,
        bundle_key: Option<Option<String>>,
        domain_id: Option<Option<i32>>,
        proxy_id: Option<Option<i32>>,
    ) -> Result<shared_bundles::Model> {
        let bundle = self.require(id).await?;

        let mut active: shared_bundles::ActiveModel = bundle.into();
        if let Some(status) = status {
            active.status = Set(status.as_str().to_string());
        }
        if let Some(bundle_key) = bundle_key {
            active.bundle_key = Set(bundle_key);
        }
        if let Some(domain_id) = domain_id {
            active.domain_id = Set(domain_id);
        }
        if let Some(proxy_id) = proxy_id {
            active.proxy_id = Set(proxy_id);
        }
        active.updated_at = Set(Utc::now());

        active
            .update(&self.conn)
            .await
            .context("Failed to update bundle")
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = shared_bundles::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete bundle")?;

        Ok(result.rows_affected > 0)
    }

    /// Atomic in-place increment; concurrent download requests must not
    /// lose counts.
    pub async fn increment_download_count(&self, id: i32) -> Result<()> {
        shared_bundles::Entity::update_many()
            .filter(shared_bundles::Column::Id.eq(id))
            .col_expr(
                shared_bundles::Column::DownloadCount,
                Expr::col(shared_bundles::Column::DownloadCount).add(1),
            )
            .exec(&self.conn)
            .await
            .context("Failed to increment download count")?;

        Ok(())
    }

    pub async fn add_event(
        &self,
        bundle_id: i32,
        user_id: i32,
        level: &str,
        message: &str,
        context: Option<serde_json::Value>,
    ) -> Result<()> {
        let row = bundle_events::ActiveModel {
            bundle_id: Set(bundle_id),
            user_id: Set(user_id),
            level: Set(level.to_string()),
            message: Set(message.to_string()),
            context: Set(context.map(|c| c.to_string())),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        row.insert(&self.conn)
            .await
            .context("Failed to record bundle event")?;

        Ok(())
    }

    pub async fn events(&self, bundle_id: i32, limit: u64) -> Result<Vec<bundle_events::Model>> {
        bundle_events::Entity::find()
            .filter(bundle_events::Column::BundleId.eq(bundle_id))
            .order_by_desc(bundle_events::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query bundle events")
    }

    async fn require(&self, id: i32) -> Result<shared_bundles::Model> {
        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Bundle not found: {id}"))
    }
}
