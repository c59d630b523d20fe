use sea_orm::entity::prelude::*;

/// Partial progress toward the next voice award block. Keyed by guild and
/// user (not channel) so accrual survives a channel move within the guild.
/// Deleted on disconnect; the remainder is discarded with it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "voice_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub guild_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    pub channel_id: i64,
    pub accumulated_seconds: i64,
    pub last_checked_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
