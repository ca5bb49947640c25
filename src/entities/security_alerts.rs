use sea_orm::entity::prelude::*;

/// Append-only security alerts. `is_read` and `is_dismissed` are monotonic
/// (false to true only).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "security_alerts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Null for system-scoped alerts (e.g. attempts against unknown emails)
    pub user_id: Option<i32>,

    pub alert_type: String,

    /// LOW | MEDIUM | HIGH | CRITICAL
    pub severity: String,

    pub message: String,

    /// Structured context as a JSON blob
    pub metadata: Option<String>,

    pub is_read: bool,

    pub is_dismissed: bool,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
