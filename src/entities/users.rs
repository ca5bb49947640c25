use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id password hash
    pub password_hash: String,

    /// Role tier: operator_root | operator | support | user
    pub role: String,

    /// active | suspended | disabled
    pub status: String,

    /// Access token of the one session allowed to act, null when logged out.
    /// Either null or equal to the session token of exactly one active
    /// session-activity row.
    pub current_session_token: Option<String>,

    pub last_login_at: Option<DateTimeUtc>,

    pub last_login_ip: Option<String>,

    /// Billing projection. At most one of the two active flags is true.
    pub is_trial_active: bool,

    pub is_billing_active: bool,

    pub trial_start_date: Option<DateTimeUtc>,

    pub trial_end_date: Option<DateTimeUtc>,

    pub billing_cycle: Option<String>,

    pub billing_cycle_start_date: Option<DateTimeUtc>,

    pub billing_cycle_end_date: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
