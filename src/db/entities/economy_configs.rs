use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "economy_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub guild_id: i64,
    pub enabled: bool,
    pub config: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EligibilityMode {
    /// Everyone may earn.
    #[default]
    #[serde(rename = "GLOBAL")]
    Global,
    /// Only members holding at least one role in `allowed_roles` may earn.
    #[serde(rename = "SELECTIVE")]
    Selective,
}

/// What the eligibility adapter answers when the external oracle fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GatePolicy {
    #[default]
    #[serde(rename = "LENIENT")]
    Lenient,
    #[serde(rename = "STRICT")]
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EconomyConfig {
    pub eligibility_mode: EligibilityMode,
    pub allowed_roles: Vec<i64>,
    pub ignored_users: Vec<i64>,
    pub chat: ChatConfig,
    pub voice: VoiceConfig,
    pub invites: InviteConfig,
    pub gate: GateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub points: i64,
    pub cooldown_minutes: i64,
    /// Maximum chat points per UTC day; 0 disables the cap.
    pub daily_cap: i64,
    pub min_length: usize,
    /// Empty list means every channel counts.
    pub allowed_channels: Vec<i64>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            points: 5,
            cooldown_minutes: 1,
            daily_cap: 40,
            min_length: 5,
            allowed_channels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub points_per_block: i64,
    pub block_minutes: i64,
    /// Channel-wide floor: below this many active participants nobody in
    /// the channel accrues.
    pub min_participants: i64,
    pub allowed_channels: Vec<i64>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            points_per_block: 2,
            block_minutes: 5,
            min_participants: 2,
            allowed_channels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteConfig {
    pub points: i64,
    /// 0 confirms the referral on join instead of holding it for the sweep.
    pub hold_hours: i64,
    pub retention_days: i64,
    pub min_account_age_days: i64,
    pub anti_reentry: bool,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            points: 10,
            hold_hours: 24,
            retention_days: 5,
            min_account_age_days: 7,
            anti_reentry: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub enabled: bool,
    pub policy: GatePolicy,
    pub cache_ttl_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            policy: GatePolicy::Lenient,
            cache_ttl_secs: 300,
        }
    }
}
