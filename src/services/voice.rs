use crate::Error;
use crate::db::entities::point_transactions::{TransactionKind, TransactionSource};
use crate::db::entities::voice_sessions;
use crate::platform::{PresenceProvider, VoiceChannelSnapshot};
use crate::services::config::ConfigService;
use crate::services::eligibility::EligibilityService;
use crate::services::ledger::LedgerService;
use crate::services::punishment::PunishmentService;
use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info};

/// Fixed tick length. The runner is a single serial task, so a tick never
/// overlaps the previous one.
pub const TICK_SECONDS: i64 = 60;

/// Accrues call time in blocks. Sessions are keyed by (guild, user), not by
/// channel, so moving between channels within a guild keeps the progress;
/// disconnecting discards it.
pub struct VoiceTracker {
    db: DatabaseConnection,
    config: Arc<ConfigService>,
    ledger: Arc<LedgerService>,
    punishment: Arc<PunishmentService>,
    eligibility: Arc<EligibilityService>,
}

impl VoiceTracker {
    pub fn new(
        db: DatabaseConnection,
        config: Arc<ConfigService>,
        ledger: Arc<LedgerService>,
        punishment: Arc<PunishmentService>,
        eligibility: Arc<EligibilityService>,
    ) -> Self {
        Self {
            db,
            config,
            ledger,
            punishment,
            eligibility,
        }
    }

    /// Processes one channel's occupancy for one tick.
    pub async fn process_snapshot(
        &self,
        snapshot: &VoiceChannelSnapshot,
        now: NaiveDateTime,
    ) -> Result<(), Error> {
        let Some(config) = self.config.get_enabled(snapshot.guild_id).await? else {
            return Ok(());
        };
        if config.voice.points_per_block <= 0 || config.voice.block_minutes <= 0 {
            return Ok(());
        }
        if !config.voice.allowed_channels.is_empty()
            && !config.voice.allowed_channels.contains(&snapshot.channel_id)
        {
            return Ok(());
        }
        if snapshot.participants.is_empty() {
            return Ok(());
        }

        let mut active = Vec::new();
        for participant in &snapshot.participants {
            if !participant.eligible
                || participant.self_muted
                || participant.server_muted
                || participant.self_deafened
                || participant.server_deafened
            {
                continue;
            }
            if self
                .punishment
                .is_frozen(snapshot.guild_id, participant.user_id)
                .await?
            {
                continue;
            }
            if !self
                .eligibility
                .check(participant.user_id, &config.gate)
                .await
                .allowed
            {
                continue;
            }
            active.push(participant.user_id);
        }

        // The threshold is channel-wide: below it nobody accrues, however
        // eligible individually.
        if (active.len() as i64) < config.voice.min_participants {
            return Ok(());
        }

        let block_seconds = config.voice.block_minutes * 60;
        for user_id in active {
            if let Err(e) = self
                .accrue(
                    snapshot.guild_id,
                    user_id,
                    snapshot.channel_id,
                    block_seconds,
                    config.voice.points_per_block,
                    now,
                )
                .await
            {
                error!(
                    "Voice accrual failed for user {} in guild {}: {:?}",
                    user_id, snapshot.guild_id, e
                );
            }
        }

        Ok(())
    }

    async fn accrue(
        &self,
        guild_id: i64,
        user_id: i64,
        channel_id: i64,
        block_seconds: i64,
        points_per_block: i64,
        now: NaiveDateTime,
    ) -> Result<(), Error> {
        let session = voice_sessions::Entity::find_by_id((guild_id, user_id))
            .one(&self.db)
            .await?;

        let accumulated = session.map(|s| s.accumulated_seconds).unwrap_or(0) + TICK_SECONDS;
        let completed_blocks = accumulated / block_seconds;
        let remainder = accumulated % block_seconds;

        // Persist the remainder before paying; a failed award must not be
        // repayable on the next tick.
        voice_sessions::Entity::insert(voice_sessions::ActiveModel {
            guild_id: Set(guild_id),
            user_id: Set(user_id),
            channel_id: Set(channel_id),
            accumulated_seconds: Set(remainder),
            last_checked_at: Set(now),
        })
        .on_conflict(
            OnConflict::columns([
                voice_sessions::Column::GuildId,
                voice_sessions::Column::UserId,
            ])
            .update_columns([
                voice_sessions::Column::ChannelId,
                voice_sessions::Column::AccumulatedSeconds,
                voice_sessions::Column::LastCheckedAt,
            ])
            .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await?;

        if completed_blocks > 0 {
            // All blocks completed this tick pay out in one transaction.
            self.ledger
                .apply(
                    guild_id,
                    user_id,
                    points_per_block * completed_blocks,
                    TransactionKind::Call,
                    TransactionSource::System,
                    None,
                    None,
                )
                .await?;
        }

        Ok(())
    }

    /// Voice disconnect: the session and its partial progress are dropped.
    pub async fn end_session(&self, guild_id: i64, user_id: i64) -> Result<(), Error> {
        voice_sessions::Entity::delete_by_id((guild_id, user_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub fn start_tick_runner(self: &Arc<Self>, presence: Arc<dyn PresenceProvider>) {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            info!("Voice tick runner started.");
            loop {
                sleep(std::time::Duration::from_secs(TICK_SECONDS as u64)).await;
                let now = Utc::now().naive_utc();

                let snapshots = match presence.snapshot().await {
                    Ok(snapshots) => snapshots,
                    Err(e) => {
                        error!("Failed to fetch voice presence snapshot: {:?}", e);
                        continue;
                    }
                };

                for snapshot in snapshots {
                    if let Err(e) = tracker.process_snapshot(&snapshot, now).await {
                        error!(
                            "Voice tick failed for channel {} in guild {}: {:?}",
                            snapshot.channel_id, snapshot.guild_id, e
                        );
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::economy_configs::EconomyConfig;
    use crate::db::test_util;
    use crate::platform::VoiceParticipant;
    use crate::services::eligibility::AllowAllGate;

    const GUILD: i64 = 1;
    const CHANNEL: i64 = 50;

    struct Harness {
        db: DatabaseConnection,
        ledger: Arc<LedgerService>,
        punishment: Arc<PunishmentService>,
        tracker: Arc<VoiceTracker>,
    }

    async fn harness(config: EconomyConfig) -> Harness {
        let db = test_util::connect().await;
        let config_service = Arc::new(ConfigService::new(db.clone()));
        config_service.set(GUILD, true, config).await.unwrap();

        let ledger = Arc::new(LedgerService::new(db.clone()));
        let punishment = Arc::new(PunishmentService::new(db.clone()));
        let eligibility = Arc::new(EligibilityService::new(Arc::new(AllowAllGate)));
        let tracker = Arc::new(VoiceTracker::new(
            db.clone(),
            config_service,
            ledger.clone(),
            punishment.clone(),
            eligibility,
        ));

        Harness {
            db,
            ledger,
            punishment,
            tracker,
        }
    }

    fn participant(user_id: i64) -> VoiceParticipant {
        VoiceParticipant {
            user_id,
            eligible: true,
            self_muted: false,
            server_muted: false,
            self_deafened: false,
            server_deafened: false,
        }
    }

    fn snapshot(channel_id: i64, participants: Vec<VoiceParticipant>) -> VoiceChannelSnapshot {
        VoiceChannelSnapshot {
            guild_id: GUILD,
            channel_id,
            participants,
        }
    }

    fn voice_config() -> EconomyConfig {
        let mut config = EconomyConfig::default();
        config.voice.points_per_block = 2;
        config.voice.block_minutes = 5;
        config.voice.min_participants = 2;
        config
    }

    async fn run_ticks(h: &Harness, snap: &VoiceChannelSnapshot, ticks: usize) {
        let now = Utc::now().naive_utc();
        for _ in 0..ticks {
            h.tracker.process_snapshot(snap, now).await.unwrap();
        }
    }

    #[tokio::test]
    async fn lone_participant_earns_nothing() {
        let h = harness(voice_config()).await;
        let snap = snapshot(CHANNEL, vec![participant(1)]);

        // Five minutes alone in the channel.
        run_ticks(&h, &snap, 5).await;

        assert_eq!(h.ledger.get_balance(GUILD, 1).await.unwrap().points, 0);
        // Below the threshold no time accrues at all.
        assert!(
            voice_sessions::Entity::find_by_id((GUILD, 1))
                .one(&h.db)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn two_participants_complete_a_block_together() {
        let h = harness(voice_config()).await;
        let snap = snapshot(CHANNEL, vec![participant(1), participant(2)]);

        run_ticks(&h, &snap, 5).await;

        for user in [1, 2] {
            assert_eq!(h.ledger.get_balance(GUILD, user).await.unwrap().points, 2);
            let session = voice_sessions::Entity::find_by_id((GUILD, user))
                .one(&h.db)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(session.accumulated_seconds, 0);
        }
    }

    #[tokio::test]
    async fn muted_and_deafened_members_do_not_count() {
        let h = harness(voice_config()).await;

        let mut muted = participant(2);
        muted.self_muted = true;
        let mut deafened = participant(3);
        deafened.server_deafened = true;
        let snap = snapshot(CHANNEL, vec![participant(1), muted, deafened]);

        // Only one active participant: channel stays below the threshold.
        run_ticks(&h, &snap, 5).await;

        for user in [1, 2, 3] {
            assert_eq!(h.ledger.get_balance(GUILD, user).await.unwrap().points, 0);
        }
    }

    #[tokio::test]
    async fn frozen_members_neither_accrue_nor_fill_the_threshold() {
        let h = harness(voice_config()).await;
        h.punishment.freeze(GUILD, 2, None, None, 9).await.unwrap();

        let snap = snapshot(CHANNEL, vec![participant(1), participant(2)]);
        run_ticks(&h, &snap, 5).await;

        assert_eq!(h.ledger.get_balance(GUILD, 1).await.unwrap().points, 0);
        assert_eq!(h.ledger.get_balance(GUILD, 2).await.unwrap().points, 0);
    }

    #[tokio::test]
    async fn progress_survives_a_channel_move() {
        let h = harness(voice_config()).await;

        let first = snapshot(CHANNEL, vec![participant(1), participant(2)]);
        run_ticks(&h, &first, 3).await;

        let moved = snapshot(CHANNEL + 1, vec![participant(1), participant(2)]);
        run_ticks(&h, &moved, 2).await;

        // 3 + 2 ticks complete the five-minute block despite the move.
        assert_eq!(h.ledger.get_balance(GUILD, 1).await.unwrap().points, 2);
        let session = voice_sessions::Entity::find_by_id((GUILD, 1))
            .one(&h.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.channel_id, CHANNEL + 1);
    }

    #[tokio::test]
    async fn multiple_completed_blocks_pay_in_one_transaction() {
        let h = harness(voice_config()).await;
        let now = Utc::now().naive_utc();

        // Pre-seed a session one tick short of two full blocks.
        voice_sessions::Entity::insert(voice_sessions::ActiveModel {
            guild_id: Set(GUILD),
            user_id: Set(1),
            channel_id: Set(CHANNEL),
            accumulated_seconds: Set(2 * 5 * 60 - TICK_SECONDS),
            last_checked_at: Set(now),
        })
        .exec_without_returning(&h.db)
        .await
        .unwrap();

        let snap = snapshot(CHANNEL, vec![participant(1), participant(2)]);
        h.tracker.process_snapshot(&snap, now).await.unwrap();

        assert_eq!(h.ledger.get_balance(GUILD, 1).await.unwrap().points, 4);
        let history = h.ledger.history(GUILD, 1, 0, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, 4);
    }

    #[tokio::test]
    async fn disconnect_discards_partial_progress() {
        let h = harness(voice_config()).await;
        let snap = snapshot(CHANNEL, vec![participant(1), participant(2)]);

        run_ticks(&h, &snap, 3).await;
        h.tracker.end_session(GUILD, 1).await.unwrap();

        assert!(
            voice_sessions::Entity::find_by_id((GUILD, 1))
                .one(&h.db)
                .await
                .unwrap()
                .is_none()
        );

        // Rejoining starts from zero: three more ticks stay short of a block.
        run_ticks(&h, &snap, 3).await;
        assert_eq!(h.ledger.get_balance(GUILD, 1).await.unwrap().points, 0);
        // The uninterrupted neighbour completes the block instead.
        assert_eq!(h.ledger.get_balance(GUILD, 2).await.unwrap().points, 2);
    }

    #[tokio::test]
    async fn channel_filter_skips_unlisted_channels() {
        let mut config = voice_config();
        config.voice.allowed_channels = vec![CHANNEL + 7];
        let h = harness(config).await;

        let snap = snapshot(CHANNEL, vec![participant(1), participant(2)]);
        run_ticks(&h, &snap, 5).await;
        assert_eq!(h.ledger.get_balance(GUILD, 1).await.unwrap().points, 0);

        let listed = snapshot(CHANNEL + 7, vec![participant(1), participant(2)]);
        run_ticks(&h, &listed, 5).await;
        assert_eq!(h.ledger.get_balance(GUILD, 1).await.unwrap().points, 2);
    }
}
