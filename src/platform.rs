use crate::Error;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A guild chat message as delivered by the gateway adapter.
///
/// The adapter enriches the raw message with the author's bot flag and role
/// ids so the engine can evaluate eligibility without calling back out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub guild_id: i64,
    pub user_id: i64,
    pub channel_id: i64,
    pub content: String,
    pub author_is_bot: bool,
    pub author_role_ids: Vec<i64>,
    pub timestamp: NaiveDateTime,
}

/// One member currently connected to a voice channel.
///
/// `eligible` carries the adapter's evaluation of the role/ignore rules;
/// freeze and oracle checks stay on the engine side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceParticipant {
    pub user_id: i64,
    pub eligible: bool,
    pub self_muted: bool,
    pub server_muted: bool,
    pub self_deafened: bool,
    pub server_deafened: bool,
}

/// Occupancy of a single voice channel at tick time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceChannelSnapshot {
    pub guild_id: i64,
    pub channel_id: i64,
    pub participants: Vec<VoiceParticipant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberJoined {
    pub guild_id: i64,
    pub inviter_id: Option<i64>,
    pub invitee_id: i64,
    pub account_age_days: i64,
    pub invited_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemberLeft {
    pub guild_id: i64,
    pub user_id: i64,
}

/// Supplies the per-tick voice occupancy of every watched channel.
#[async_trait::async_trait]
pub trait PresenceProvider: Send + Sync {
    async fn snapshot(&self) -> Result<Vec<VoiceChannelSnapshot>, Error>;
}

/// Answers whether a user is still a member of a guild. Consulted by the
/// invite sweep before confirming a pending referral.
#[async_trait::async_trait]
pub trait MembershipProvider: Send + Sync {
    async fn is_member(&self, guild_id: i64, user_id: i64) -> Result<bool, Error>;
}
