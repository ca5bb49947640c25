use sea_orm::entity::prelude::*;

/// Client-reported bundle status events. Visibility only, no behavioral
/// effect.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "bundle_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub bundle_id: i32,

    pub user_id: i32,

    pub level: String,

    pub message: String,

    pub context: Option<String>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
