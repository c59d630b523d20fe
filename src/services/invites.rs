use crate::Error;
use crate::db::entities::economy_configs::EconomyConfig;
use crate::db::entities::invite_ledger::{self, InviteStatus, RevokeReason};
use crate::db::entities::point_transactions::{TransactionKind, TransactionSource};
use crate::platform::{MemberJoined, MembershipProvider};
use crate::services::config::ConfigService;
use crate::services::eligibility::EligibilityService;
use crate::services::ledger::LedgerService;
use crate::services::punishment::PunishmentService;
use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info};

const SWEEP_INTERVAL_SECONDS: u64 = 300;

/// Invite referral funnel: one entry per (guild, invitee), moving
/// PENDING -> CONFIRMED or PENDING -> REVOKED, with a retention-window
/// claw-back from CONFIRMED. A confirmed entry never pays a second time
/// while anti-reentry is on.
pub struct InviteService {
    db: DatabaseConnection,
    config: Arc<ConfigService>,
    ledger: Arc<LedgerService>,
    punishment: Arc<PunishmentService>,
    eligibility: Arc<EligibilityService>,
}

impl InviteService {
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

    pub async fn member_joined(&self, event: &MemberJoined) -> Result<(), Error> {
        let Some(config) = self.config.get_enabled(event.guild_id).await? else {
            return Ok(());
        };
        if config.invites.points <= 0 {
            return Ok(());
        }
        let Some(inviter_id) = event.inviter_id else {
            return Ok(());
        };
        if inviter_id == event.invitee_id {
            return Ok(());
        }

        let existing = invite_ledger::Entity::find_by_id((event.guild_id, event.invitee_id))
            .one(&self.db)
            .await?;
        if config.invites.anti_reentry {
            if let Some(entry) = &existing {
                if entry.status == InviteStatus::Confirmed {
                    return Ok(());
                }
            }
        }

        let now = event.invited_at;

        if event.account_age_days < config.invites.min_account_age_days {
            self.upsert_entry(invite_ledger::ActiveModel {
                guild_id: Set(event.guild_id),
                invitee_id: Set(event.invitee_id),
                inviter_id: Set(inviter_id),
                invited_at: Set(now),
                status: Set(InviteStatus::Revoked),
                confirmed_at: Set(None),
                revoked_at: Set(Some(now)),
                revoked_reason: Set(Some(RevokeReason::MinAccountAge)),
                points_awarded: Set(0),
            })
            .await?;
            return Ok(());
        }

        self.upsert_entry(invite_ledger::ActiveModel {
            guild_id: Set(event.guild_id),
            invitee_id: Set(event.invitee_id),
            inviter_id: Set(inviter_id),
            invited_at: Set(now),
            status: Set(InviteStatus::Pending),
            confirmed_at: Set(None),
            revoked_at: Set(None),
            revoked_reason: Set(None),
            points_awarded: Set(0),
        })
        .await?;

        if config.invites.hold_hours == 0 {
            let entry = invite_ledger::Entity::find_by_id((event.guild_id, event.invitee_id))
                .one(&self.db)
                .await?
                .ok_or_else(|| anyhow::anyhow!("invite entry missing after upsert"))?;
            self.confirm_entry(&config, entry, now).await?;
        }

        Ok(())
    }

    /// Confirms a pending entry, paying the inviter unless the oracle says
    /// no. A frozen inviter leaves the entry pending so a later sweep can
    /// pay once the freeze is lifted.
    async fn confirm_entry(
        &self,
        config: &EconomyConfig,
        entry: invite_ledger::Model,
        now: NaiveDateTime,
    ) -> Result<(), Error> {
        if self
            .punishment
            .is_frozen(entry.guild_id, entry.inviter_id)
            .await?
        {
            return Ok(());
        }

        let gate = self.eligibility.check(entry.inviter_id, &config.gate).await;
        let awarded = if gate.allowed {
            self.ledger
                .apply(
                    entry.guild_id,
                    entry.inviter_id,
                    config.invites.points,
                    TransactionKind::Invite,
                    TransactionSource::System,
                    Some("invite confirmed"),
                    None,
                )
                .await?;
            config.invites.points
        } else {
            // Confirmed with zero so a re-join cannot farm another attempt.
            0
        };

        let mut entry: invite_ledger::ActiveModel = entry.into();
        entry.status = Set(InviteStatus::Confirmed);
        entry.confirmed_at = Set(Some(now));
        entry.points_awarded = Set(awarded);
        entry.update(&self.db).await?;

        Ok(())
    }

    /// Settles every pending entry whose hold period has elapsed: departed
    /// invitees are revoked, the rest confirm and pay.
    pub async fn sweep(
        &self,
        membership: &dyn MembershipProvider,
        now: NaiveDateTime,
    ) -> Result<(), Error> {
        let pending = invite_ledger::Entity::find()
            .filter(invite_ledger::Column::Status.eq(InviteStatus::Pending))
            .all(&self.db)
            .await?;

        for entry in pending {
            let guild_id = entry.guild_id;
            let invitee_id = entry.invitee_id;
            if let Err(e) = self.sweep_entry(membership, entry, now).await {
                error!(
                    "Invite sweep failed for invitee {} in guild {}: {:?}",
                    invitee_id, guild_id, e
                );
            }
        }

        Ok(())
    }

    async fn sweep_entry(
        &self,
        membership: &dyn MembershipProvider,
        entry: invite_ledger::Model,
        now: NaiveDateTime,
    ) -> Result<(), Error> {
        let Some(config) = self.config.get_enabled(entry.guild_id).await? else {
            return Ok(());
        };
        if now - entry.invited_at < Duration::hours(config.invites.hold_hours) {
            return Ok(());
        }

        if !membership.is_member(entry.guild_id, entry.invitee_id).await? {
            self.revoke(entry, RevokeReason::LeftBeforeConfirmation, now)
                .await?;
        } else {
            self.confirm_entry(&config, entry, now).await?;
        }

        Ok(())
    }

    pub async fn member_left(
        &self,
        guild_id: i64,
        user_id: i64,
        now: NaiveDateTime,
    ) -> Result<(), Error> {
        let Some(entry) = invite_ledger::Entity::find_by_id((guild_id, user_id))
            .one(&self.db)
            .await?
        else {
            return Ok(());
        };

        match entry.status {
            InviteStatus::Pending => {
                self.revoke(entry, RevokeReason::LeftBeforeConfirmation, now)
                    .await?;
            }
            InviteStatus::Confirmed => {
                let Some(config) = self.config.get_enabled(guild_id).await? else {
                    return Ok(());
                };
                let Some(confirmed_at) = entry.confirmed_at else {
                    return Ok(());
                };
                // Outside the retention window leaving changes nothing.
                if now - confirmed_at > Duration::days(config.invites.retention_days) {
                    return Ok(());
                }

                if entry.points_awarded != 0 {
                    // Reverse exactly what was paid at confirmation time,
                    // not a recomputation from current config.
                    self.ledger
                        .apply(
                            guild_id,
                            entry.inviter_id,
                            -entry.points_awarded,
                            TransactionKind::InviteRevoke,
                            TransactionSource::System,
                            Some("invitee left within retention window"),
                            None,
                        )
                        .await?;
                }
                self.revoke(entry, RevokeReason::LeftWithinRetention, now)
                    .await?;
            }
            InviteStatus::Revoked => {}
        }

        Ok(())
    }

    async fn revoke(
        &self,
        entry: invite_ledger::Model,
        reason: RevokeReason,
        now: NaiveDateTime,
    ) -> Result<(), Error> {
        let mut entry: invite_ledger::ActiveModel = entry.into();
        entry.status = Set(InviteStatus::Revoked);
        entry.revoked_at = Set(Some(now));
        entry.revoked_reason = Set(Some(reason));
        entry.update(&self.db).await?;
        Ok(())
    }

    /// A rejoin reuses the unique (guild, invitee) slot, restarting the
    /// funnel for the new membership.
    async fn upsert_entry(&self, entry: invite_ledger::ActiveModel) -> Result<(), Error> {
        invite_ledger::Entity::insert(entry)
            .on_conflict(
                OnConflict::columns([
                    invite_ledger::Column::GuildId,
                    invite_ledger::Column::InviteeId,
                ])
                .update_columns([
                    invite_ledger::Column::InviterId,
                    invite_ledger::Column::InvitedAt,
                    invite_ledger::Column::Status,
                    invite_ledger::Column::ConfirmedAt,
                    invite_ledger::Column::RevokedAt,
                    invite_ledger::Column::RevokedReason,
                    invite_ledger::Column::PointsAwarded,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    pub async fn entry(
        &self,
        guild_id: i64,
        invitee_id: i64,
    ) -> Result<Option<invite_ledger::Model>, Error> {
        Ok(invite_ledger::Entity::find_by_id((guild_id, invitee_id))
            .one(&self.db)
            .await?)
    }

    pub fn start_sweep_runner(self: &Arc<Self>, membership: Arc<dyn MembershipProvider>) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            info!("Invite sweep runner started.");
            loop {
                sleep(std::time::Duration::from_secs(SWEEP_INTERVAL_SECONDS)).await;
                let now = Utc::now().naive_utc();
                if let Err(e) = service.sweep(membership.as_ref(), now).await {
                    error!("Invite sweep iteration failed: {:?}", e);
                }
            }
        });
    }
}
