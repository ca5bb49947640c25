//! Shared-bundle distribution: lifecycle transitions and presigned
//! object-store handoff.
//!
//! There is one bundle per deployment, identified by a well-known name and
//! created lazily on first read. Upload keys are versioned and unique per
//! request; when uploads race, the last complete-upload wins.

use thiserror::Error;
use uuid::Uuid;

use crate::db::Store;
use crate::entities::shared_bundles;
use crate::models::BundleStatus;
use crate::storage::{ObjectStoreSigner, PresignedRequest};

pub const SHARED_BUNDLE_NAME: &str = "shared-session";

const UPLOAD_URL_TTL_SECS: u64 = 1800;
const DOWNLOAD_URL_TTL_SECS: u64 = 900;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Bundle not found")]
    NotFound,

    #[error("Bundle is not downloadable: {0}")]
    NotReady(String),

    #[error("No upload in progress for this bundle")]
    NoPendingUpload,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Object store error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for BundleError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Clone)]
pub struct BundleService {
    store: Store,
    signer: ObjectStoreSigner,
}

impl BundleService {
    #[must_use]
    pub const fn new(store: Store, signer: ObjectStoreSigner) -> Self {
        Self { store, signer }
    }

    /// The shared bundle, creating a pending row on first read.
    pub async fn shared_bundle(&self) -> Result<shared_bundles::Model, BundleError> {
        Ok(self
            .store
            .bundle_repo()
            .get_or_create(SHARED_BUNDLE_NAME)
            .await?)
    }

    pub async fn get(&self, id: i32) -> Result<shared_bundles::Model, BundleError> {
        self.store
            .bundle_repo()
            .get(id)
            .await?
            .ok_or(BundleError::NotFound)
    }

    /// Issues a presigned PUT for a fresh versioned key. Bundle state does
    /// not advance here; only complete-upload moves it.
    pub async fn request_upload(&self, id: i32) -> Result<PresignedRequest, BundleError> {
        let bundle = self.get(id).await?;

        let key = format!(
            "bundles/{}/v{}-{}.zip",
            bundle.name,
            bundle.bundle_version + 1,
            Uuid::new_v4()
        );

        let presigned = self
            .signer
            .presign_put(&key, UPLOAD_URL_TTL_SECS)
            .map_err(|e| BundleError::Upstream(e.to_string()))?;

        self.store.bundle_repo().set_pending_key(id, &key).await?;

        Ok(presigned)
    }

    /// Promotes the issued key, bumps the version, and transitions to
    /// ready. The object's existence is trusted, not verified: a bad
    /// upload is recoverable with a fresh capture.
    pub async fn complete_upload(
        &self,
        id: i32,
        checksum: Option<String>,
        file_size_bytes: Option<i64>,
    ) -> Result<shared_bundles::Model, BundleError> {
        let bundle = self.get(id).await?;

        if bundle.pending_bundle_key.is_none() {
            return Err(BundleError::NoPendingUpload);
        }

        Ok(self
            .store
            .bundle_repo()
            .complete_upload(id, checksum, file_size_bytes)
            .await?)
    }

    /// Issues a presigned GET against the current key. The issuance is the
    /// only thing recorded server-side; the object store logs the fetch.
    pub async fn request_download(&self, id: i32) -> Result<PresignedRequest, BundleError> {
        let bundle = self.get(id).await?;

        let status: BundleStatus = bundle
            .status
            .parse()
            .map_err(BundleError::Validation)?;

        if !status.is_downloadable() {
            return Err(BundleError::NotReady(bundle.status));
        }

        let Some(key) = bundle.bundle_key else {
            return Err(BundleError::NotReady("no object uploaded yet".to_string()));
        };

        let presigned = self
            .signer
            .presign_get(&key, DOWNLOAD_URL_TTL_SECS)
            .map_err(|e| BundleError::Upstream(e.to_string()))?;

        self.store.bundle_repo().increment_download_count(id).await?;

        Ok(presigned)
    }

    /// Operator-root force-transition for bundles uploaded out-of-band.
    /// Requires a key to already be on the row so the ready invariant
    /// (ready implies an object exists) holds.
    pub async fn mark_ready(&self, id: i32) -> Result<shared_bundles::Model, BundleError> {
        let bundle = self.get(id).await?;

        if bundle.bundle_key.is_none() {
            return Err(BundleError::Validation(
                "Bundle has no object key; upload one or set the key first".to_string(),
            ));
        }

        self.store
            .bundle_repo()
            .set_status(id, BundleStatus::Ready)
            .await?;

        self.get(id).await
    }

    pub async fn report_event(
        &self,
        id: i32,
        user_id: i32,
        level: &str,
        message: &str,
        context: Option<serde_json::Value>,
    ) -> Result<(), BundleError> {
        // Verify the bundle exists so events cannot dangle
        self.get(id).await?;

        Ok(self
            .store
            .bundle_repo()
            .add_event(id, user_id, level, message, context)
            .await?)
    }
}
