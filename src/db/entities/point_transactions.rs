use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TransactionKind {
    #[sea_orm(string_value = "CHAT")]
    Chat,
    #[sea_orm(string_value = "CALL")]
    Call,
    #[sea_orm(string_value = "INVITE")]
    Invite,
    #[sea_orm(string_value = "INVITE_REVOKE")]
    InviteRevoke,
    #[sea_orm(string_value = "ADMIN_ADD")]
    AdminAdd,
    #[sea_orm(string_value = "ADMIN_REMOVE")]
    AdminRemove,
    #[sea_orm(string_value = "RESET")]
    Reset,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum TransactionSource {
    #[sea_orm(string_value = "SYSTEM")]
    System,
    #[sea_orm(string_value = "ADMIN")]
    Admin,
}

/// Append-only audit log. Exactly one row per balance mutation, written in
/// the same storage transaction as the balance update.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Eq)]
#[sea_orm(table_name = "point_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub guild_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub kind: TransactionKind,
    pub source: TransactionSource,
    pub reason: Option<String>,
    pub actor_id: Option<i64>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
