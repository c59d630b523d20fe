use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum InviteStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "REVOKED")]
    Revoked,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum RevokeReason {
    #[sea_orm(string_value = "IDADE_MINIMA")]
    MinAccountAge,
    #[sea_orm(string_value = "SAIU_ANTES_CONFIRMACAO")]
    LeftBeforeConfirmation,
    #[sea_orm(string_value = "SAIU_ANTES_PRAZO")]
    LeftWithinRetention,
}

/// One funnel entry per (guild, invitee). `points_awarded` is frozen at
/// confirmation time; the retention claw-back reverses exactly this amount.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Eq)]
#[sea_orm(table_name = "invite_ledger")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub guild_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub invitee_id: i64,
    pub inviter_id: i64,
    pub invited_at: DateTime,
    pub status: InviteStatus,
    pub confirmed_at: Option<DateTime>,
    pub revoked_at: Option<DateTime>,
    pub revoked_reason: Option<RevokeReason>,
    pub points_awarded: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
