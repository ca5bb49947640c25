use sea_orm::entity::prelude::*;

/// Durable record of one login's lifetime. For any user at most one row is
/// active at a time; rows go inactive exactly once and never come back.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "session_activity")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub user_id: i32,

    /// The access token minted at login; rewritten in place on refresh so
    /// the row's identity survives token rotation.
    pub session_token: String,

    pub device_fingerprint: Option<String>,

    pub ip: Option<String>,

    pub city: Option<String>,

    pub country: Option<String>,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    pub login_at: DateTimeUtc,

    pub last_activity_at: DateTimeUtc,

    pub is_active: bool,

    pub logout_at: Option<DateTimeUtc>,

    /// manual | new_login | forced_by_admin | token_expired
    pub logout_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
