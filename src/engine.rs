use crate::Error;
use crate::platform::{ChatMessage, MemberJoined, MemberLeft, MembershipProvider, PresenceProvider};
use crate::services::chat::{ChatOutcome, ChatTracker};
use crate::services::config::ConfigService;
use crate::services::eligibility::{EligibilityService, ProfileGate};
use crate::services::invites::InviteService;
use crate::services::leaderboard::LeaderboardService;
use crate::services::ledger::LedgerService;
use crate::services::punishment::PunishmentService;
use crate::services::voice::VoiceTracker;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// One engine instance per process: owns every service and their caches so
/// tests get fresh state by constructing a new engine.
pub struct Engine {
    pub db: DatabaseConnection,
    pub config: Arc<ConfigService>,
    pub ledger: Arc<LedgerService>,
    pub punishment: Arc<PunishmentService>,
    pub eligibility: Arc<EligibilityService>,
    pub chat: Arc<ChatTracker>,
    pub voice: Arc<VoiceTracker>,
    pub invites: Arc<InviteService>,
    pub leaderboard: Arc<LeaderboardService>,
}

impl Engine {
    pub fn new(db: DatabaseConnection, gate: Arc<dyn ProfileGate>) -> Self {
        let config = Arc::new(ConfigService::new(db.clone()));
        let ledger = Arc::new(LedgerService::new(db.clone()));
        let punishment = Arc::new(PunishmentService::new(db.clone()));
        let eligibility = Arc::new(EligibilityService::new(gate));

        let chat = Arc::new(ChatTracker::new(
            db.clone(),
            config.clone(),
            ledger.clone(),
            punishment.clone(),
            eligibility.clone(),
        ));
        let voice = Arc::new(VoiceTracker::new(
            db.clone(),
            config.clone(),
            ledger.clone(),
            punishment.clone(),
            eligibility.clone(),
        ));
        let invites = Arc::new(InviteService::new(
            db.clone(),
            config.clone(),
            ledger.clone(),
            punishment.clone(),
            eligibility.clone(),
        ));
        let leaderboard = Arc::new(LeaderboardService::new(db.clone(), ledger.clone()));

        Self {
            db,
            config,
            ledger,
            punishment,
            eligibility,
            chat,
            voice,
            invites,
            leaderboard,
        }
    }

    /// Spawns the voice tick, invite sweep and leaderboard publish loops.
    /// They run until the process exits.
    pub fn start_runners(
        &self,
        presence: Arc<dyn PresenceProvider>,
        membership: Arc<dyn MembershipProvider>,
    ) {
        self.voice.start_tick_runner(presence);
        self.invites.start_sweep_runner(membership);
        self.leaderboard.start_publish_runner();
    }

    pub async fn handle_message(&self, message: &ChatMessage) -> Result<ChatOutcome, Error> {
        self.chat.handle_message(message).await
    }

    pub async fn member_joined(&self, event: &MemberJoined) -> Result<(), Error> {
        self.invites.member_joined(event).await
    }

    /// A guild leave reaches both trackers: the voice session is dropped
    /// and the invite funnel settles the entry.
    pub async fn member_left(&self, event: &MemberLeft) -> Result<(), Error> {
        let now = Utc::now().naive_utc();
        self.voice.end_session(event.guild_id, event.user_id).await?;
        self.invites
            .member_left(event.guild_id, event.user_id, now)
            .await?;
        Ok(())
    }

    /// Voice disconnect without leaving the guild.
    pub async fn voice_disconnected(&self, guild_id: i64, user_id: i64) -> Result<(), Error> {
        self.voice.end_session(guild_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::economy_configs::EconomyConfig;
    use crate::db::entities::invite_ledger::{InviteStatus, RevokeReason};
    use crate::db::test_util;
    use crate::services::eligibility::AllowAllGate;

    const GUILD: i64 = 1;

    #[tokio::test]
    async fn member_left_settles_voice_and_invites() {
        let db = test_util::connect().await;
        let engine = Engine::new(db, Arc::new(AllowAllGate));
        engine
            .config
            .set(GUILD, true, EconomyConfig::default())
            .await
            .unwrap();

        let now = Utc::now().naive_utc();
        engine
            .member_joined(&MemberJoined {
                guild_id: GUILD,
                inviter_id: Some(7),
                invitee_id: 8,
                account_age_days: 100,
                invited_at: now,
            })
            .await
            .unwrap();

        engine
            .member_left(&MemberLeft {
                guild_id: GUILD,
                user_id: 8,
            })
            .await
            .unwrap();

        let entry = engine.invites.entry(GUILD, 8).await.unwrap().unwrap();
        assert_eq!(entry.status, InviteStatus::Revoked);
        assert_eq!(
            entry.revoked_reason,
            Some(RevokeReason::LeftBeforeConfirmation)
        );
    }
}
