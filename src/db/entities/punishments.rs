use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Moderator-imposed accrual suspension. `expires_at = None` means
/// indefinite. Lifting deactivates the row; history is never deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Eq)]
#[sea_orm(table_name = "punishments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub guild_id: i64,
    pub user_id: i64,
    pub moderator_id: i64,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime>,
    pub active: bool,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
