use crate::Error;
use crate::db::entities::{balances, punishments};
use crate::services::cache::TtlCache;
use crate::services::ledger::ensure_balance_row;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::time::Duration;

const FREEZE_CACHE_TTL: Duration = Duration::from_secs(30);

/// `frozen_until` value standing in for "no expiry".
pub fn indefinite_freeze() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(9999, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Tracks moderator-imposed accrual suspensions. Consulted by every accrual
/// path, so reads go through a short TTL cache that freeze/lift invalidate.
pub struct PunishmentService {
    db: DatabaseConnection,
    cache: TtlCache<(i64, i64), bool>,
}

impl PunishmentService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            cache: TtlCache::new(FREEZE_CACHE_TTL),
        }
    }

    /// Suspends accrual for a user. `expires_at = None` freezes
    /// indefinitely. Points are left untouched.
    pub async fn freeze(
        &self,
        guild_id: i64,
        user_id: i64,
        expires_at: Option<NaiveDateTime>,
        reason: Option<&str>,
        moderator_id: i64,
    ) -> Result<(), Error> {
        let now = Utc::now().naive_utc();
        if let Some(at) = expires_at {
            if at <= now {
                anyhow::bail!("freeze expiry must be in the future");
            }
        }

        punishments::ActiveModel {
            guild_id: Set(guild_id),
            user_id: Set(user_id),
            moderator_id: Set(moderator_id),
            reason: Set(reason.map(str::to_string)),
            expires_at: Set(expires_at),
            active: Set(true),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        ensure_balance_row(&self.db, guild_id, user_id, now).await?;
        let until = expires_at.unwrap_or_else(indefinite_freeze);
        balances::Entity::update_many()
            .col_expr(balances::Column::FrozenUntil, Expr::value(Some(until)))
            .filter(balances::Column::GuildId.eq(guild_id))
            .filter(balances::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        self.cache.invalidate(&(guild_id, user_id));
        Ok(())
    }

    /// Deactivates open punishments and clears the freeze. History rows are
    /// kept.
    pub async fn lift(&self, guild_id: i64, user_id: i64) -> Result<(), Error> {
        punishments::Entity::update_many()
            .col_expr(punishments::Column::Active, Expr::value(false))
            .filter(punishments::Column::GuildId.eq(guild_id))
            .filter(punishments::Column::UserId.eq(user_id))
            .filter(punishments::Column::Active.eq(true))
            .exec(&self.db)
            .await?;

        balances::Entity::update_many()
            .col_expr(
                balances::Column::FrozenUntil,
                Expr::value(None::<NaiveDateTime>),
            )
            .filter(balances::Column::GuildId.eq(guild_id))
            .filter(balances::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        self.cache.invalidate(&(guild_id, user_id));
        Ok(())
    }

    /// True iff the user is currently frozen. Expired freezes are cleared
    /// lazily on read.
    pub async fn is_frozen(&self, guild_id: i64, user_id: i64) -> Result<bool, Error> {
        if let Some(hit) = self.cache.get(&(guild_id, user_id)) {
            return Ok(hit);
        }

        let now = Utc::now().naive_utc();
        let balance = balances::Entity::find_by_id((guild_id, user_id))
            .one(&self.db)
            .await?;

        let frozen = match balance.and_then(|b| b.frozen_until) {
            Some(until) if until > now => true,
            Some(_) => {
                self.clear_expired(guild_id, user_id, now).await?;
                false
            }
            None => false,
        };

        self.cache.insert((guild_id, user_id), frozen);
        Ok(frozen)
    }

    async fn clear_expired(
        &self,
        guild_id: i64,
        user_id: i64,
        now: NaiveDateTime,
    ) -> Result<(), Error> {
        balances::Entity::update_many()
            .col_expr(
                balances::Column::FrozenUntil,
                Expr::value(None::<NaiveDateTime>),
            )
            .filter(balances::Column::GuildId.eq(guild_id))
            .filter(balances::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        punishments::Entity::update_many()
            .col_expr(punishments::Column::Active, Expr::value(false))
            .filter(punishments::Column::GuildId.eq(guild_id))
            .filter(punishments::Column::UserId.eq(user_id))
            .filter(punishments::Column::Active.eq(true))
            .filter(punishments::Column::ExpiresAt.is_not_null())
            .filter(punishments::Column::ExpiresAt.lte(now))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    pub async fn active_punishment(
        &self,
        guild_id: i64,
        user_id: i64,
    ) -> Result<Option<punishments::Model>, Error> {
        Ok(punishments::Entity::find()
            .filter(punishments::Column::GuildId.eq(guild_id))
            .filter(punishments::Column::UserId.eq(user_id))
            .filter(punishments::Column::Active.eq(true))
            .order_by_desc(punishments::Column::CreatedAt)
            .one(&self.db)
            .await?)
    }

    pub async fn history(
        &self,
        guild_id: i64,
        user_id: i64,
    ) -> Result<Vec<punishments::Model>, Error> {
        Ok(punishments::Entity::find()
            .filter(punishments::Column::GuildId.eq(guild_id))
            .filter(punishments::Column::UserId.eq(user_id))
            .order_by_desc(punishments::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }
}
