use sea_orm::entity::prelude::*;

/// Payment ledger. Rows are never mutated after creation; the user-level
/// billing fields are a materialized projection of this table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub user_id: i32,

    pub amount: f64,

    /// Cycle purchased: DAILY | WEEKLY | MONTHLY | THREE_MONTHS | HALF_YEAR | YEARLY
    pub cycle: String,

    pub payment_date: DateTimeUtc,

    pub cycle_start_date: DateTimeUtc,

    pub cycle_end_date: DateTimeUtc,

    pub memo: Option<String>,

    /// Administrator who recorded the payment
    pub created_by: i32,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
