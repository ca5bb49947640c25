use sea_orm::entity::prelude::*;

/// The shared session bundle. At most one row per deployment under the
/// well-known name; created lazily on first read.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "shared_bundles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,

    /// pending | uploading | ready | downloading | auth_error | proxy_error | disabled
    pub status: String,

    /// Object-store key of the current downloadable version. Non-null
    /// whenever status is ready.
    pub bundle_key: Option<String>,

    /// Key issued by the most recent request-upload; promoted to
    /// `bundle_key` on complete-upload.
    pub pending_bundle_key: Option<String>,

    pub checksum: Option<String>,

    pub file_size_bytes: Option<i64>,

    /// Monotonically increasing; bumped once per completed upload.
    pub bundle_version: i64,

    /// Count of download-URL issuances (the object store logs the GETs).
    pub download_count: i64,

    pub domain_id: Option<i32>,

    pub proxy_id: Option<i32>,

    pub last_synced_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
