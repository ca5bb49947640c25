use sea_orm::entity::prelude::*;

/// One row per login attempt against an existing account, successful or
/// not. Append-only.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "login_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub user_id: i32,

    /// Email exactly as supplied by the caller
    pub email: String,

    pub ip: Option<String>,

    pub city: Option<String>,

    pub country: Option<String>,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    pub device_fingerprint: Option<String>,

    pub success: bool,

    pub failure_reason: Option<String>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
