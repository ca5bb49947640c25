use sea_orm::entity::prelude::*;

/// Append-only audit of billing-state transitions. Support tooling only;
/// nothing reads it back for behavior.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "billing_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub user_id: i32,

    /// CYCLE_STARTED | PAYMENT_ADDED | TRIAL_STARTED | AUTO_DISABLED
    pub event_type: String,

    pub details: Option<String>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
