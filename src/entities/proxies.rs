use sea_orm::entity::prelude::*;

/// Egress proxy catalog entry annotating the shared bundle.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "proxies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub host: String,

    pub port: i32,

    pub username: Option<String>,

    pub password: Option<String>,

    pub enabled: bool,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
