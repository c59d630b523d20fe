use crate::Error;
use crate::db::entities::chat_activities;
use crate::db::entities::economy_configs::EligibilityMode;
use crate::db::entities::point_transactions::{TransactionKind, TransactionSource};
use crate::platform::ChatMessage;
use crate::services::config::ConfigService;
use crate::services::eligibility::EligibilityService;
use crate::services::ledger::LedgerService;
use crate::services::punishment::PunishmentService;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOutcome {
    Awarded(i64),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    IneligibleAuthor,
    Frozen,
    GateDenied,
    ChannelNotAllowed,
    TooShort,
    DuplicateContent,
    OnCooldown,
    DailyCapReached,
}

/// Awards chat points, subject to the per-user cooldown, the
/// consecutive-duplicate filter and the UTC daily cap.
pub struct ChatTracker {
    db: DatabaseConnection,
    config: Arc<ConfigService>,
    ledger: Arc<LedgerService>,
    punishment: Arc<PunishmentService>,
    eligibility: Arc<EligibilityService>,
}

impl ChatTracker {
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

    pub async fn handle_message(&self, msg: &ChatMessage) -> Result<ChatOutcome, Error> {
        use ChatOutcome::Skipped;

        let Some(config) = self.config.get_enabled(msg.guild_id).await? else {
            return Ok(Skipped(SkipReason::Disabled));
        };
        if config.chat.points <= 0 {
            return Ok(Skipped(SkipReason::Disabled));
        }

        if msg.author_is_bot || config.ignored_users.contains(&msg.user_id) {
            return Ok(Skipped(SkipReason::IneligibleAuthor));
        }
        if config.eligibility_mode == EligibilityMode::Selective
            && !msg
                .author_role_ids
                .iter()
                .any(|role| config.allowed_roles.contains(role))
        {
            return Ok(Skipped(SkipReason::IneligibleAuthor));
        }

        if self.punishment.is_frozen(msg.guild_id, msg.user_id).await? {
            return Ok(Skipped(SkipReason::Frozen));
        }
        if !self.eligibility.check(msg.user_id, &config.gate).await.allowed {
            return Ok(Skipped(SkipReason::GateDenied));
        }

        if !config.chat.allowed_channels.is_empty()
            && !config.chat.allowed_channels.contains(&msg.channel_id)
        {
            return Ok(Skipped(SkipReason::ChannelNotAllowed));
        }

        if msg.content.trim().chars().count() < config.chat.min_length {
            return Ok(Skipped(SkipReason::TooShort));
        }

        let activity = chat_activities::Entity::find_by_id((msg.guild_id, msg.user_id))
            .one(&self.db)
            .await?;

        // Blocks only the exact consecutive duplicate; repeating an older
        // message is fine.
        let hash = content_hash(&msg.content);
        if let Some(previous) = &activity {
            if previous.last_content_hash.as_deref() == Some(hash.as_str()) {
                return Ok(Skipped(SkipReason::DuplicateContent));
            }
        }

        let now = msg.timestamp;
        if let Some(last) = activity.as_ref().and_then(|a| a.last_message_at) {
            if now - last < chrono::Duration::minutes(config.chat.cooldown_minutes) {
                return Ok(Skipped(SkipReason::OnCooldown));
            }
        }

        let today = now.date();
        let daily_points = activity
            .as_ref()
            .filter(|a| a.daily_date == today)
            .map(|a| a.daily_points)
            .unwrap_or(0);

        let mut award = config.chat.points;
        if config.chat.daily_cap > 0 {
            let remaining = config.chat.daily_cap - daily_points;
            if remaining <= 0 {
                return Ok(Skipped(SkipReason::DailyCapReached));
            }
            award = award.min(remaining);
        }

        self.ledger
            .apply(
                msg.guild_id,
                msg.user_id,
                award,
                TransactionKind::Chat,
                TransactionSource::System,
                None,
                None,
            )
            .await?;

        chat_activities::Entity::insert(chat_activities::ActiveModel {
            guild_id: Set(msg.guild_id),
            user_id: Set(msg.user_id),
            last_message_at: Set(Some(now)),
            last_content_hash: Set(Some(hash)),
            daily_points: Set(daily_points + award),
            daily_date: Set(today),
        })
        .on_conflict(
            OnConflict::columns([
                chat_activities::Column::GuildId,
                chat_activities::Column::UserId,
            ])
            .update_columns([
                chat_activities::Column::LastMessageAt,
                chat_activities::Column::LastContentHash,
                chat_activities::Column::DailyPoints,
                chat_activities::Column::DailyDate,
            ])
            .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await?;

        Ok(ChatOutcome::Awarded(award))
    }
}

/// SHA-256 over the trimmed, lowercased, whitespace-collapsed content.
fn content_hash(content: &str) -> String {
    let normalized = content
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    hex::encode(Sha256::digest(normalized.as_bytes()))
}
