use sea_orm::entity::prelude::*;

/// Per-(guild, user) chat accrual state: cooldown anchor, last content hash
/// for consecutive-duplicate rejection, and the daily counter.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "chat_activities")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub guild_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    pub last_message_at: Option<DateTime>,
    pub last_content_hash: Option<String>,
    pub daily_points: i64,
    pub daily_date: Date,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
