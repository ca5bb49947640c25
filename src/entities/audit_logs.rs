use sea_orm::entity::prelude::*;

/// Privileged-action journal, written fire-and-forget from handlers.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub actor_id: i32,

    pub action: String,

    pub target_type: String,

    pub target_id: Option<String>,

    pub metadata: Option<String>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
