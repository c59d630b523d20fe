use crate::Error;
use crate::db::entities::{
    balances,
    point_transactions::{self, TransactionKind, TransactionSource},
};
use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

/// The balance store plus its append-only transaction log.
///
/// Every mutation goes through [`LedgerService::apply`], which clamps the
/// balance at zero server-side and writes the audit row in the same storage
/// transaction. Concurrent callers for the same (guild, user) are expected;
/// the arithmetic never runs in process memory.
pub struct LedgerService {
    db: DatabaseConnection,
}

impl LedgerService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Applies a signed delta and records it. Returns the updated balance.
    pub async fn apply(
        &self,
        guild_id: i64,
        user_id: i64,
        delta: i64,
        kind: TransactionKind,
        source: TransactionSource,
        reason: Option<&str>,
        actor_id: Option<i64>,
    ) -> Result<balances::Model, Error> {
        let now = Utc::now().naive_utc();
        let txn = self.db.begin().await?;

        ensure_balance_row(&txn, guild_id, user_id, now).await?;

        balances::Entity::update_many()
            .col_expr(
                balances::Column::Points,
                Expr::cust_with_values(
                    "CASE WHEN points + ? < 0 THEN 0 ELSE points + ? END",
                    [delta, delta],
                ),
            )
            .filter(balances::Column::GuildId.eq(guild_id))
            .filter(balances::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        point_transactions::ActiveModel {
            guild_id: Set(guild_id),
            user_id: Set(user_id),
            amount: Set(delta),
            kind: Set(kind),
            source: Set(source),
            reason: Set(reason.map(str::to_string)),
            actor_id: Set(actor_id),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let updated = balances::Entity::find_by_id((guild_id, user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("balance row missing after update"))?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Reads a balance, lazily creating the zero row on first touch.
    pub async fn get_balance(&self, guild_id: i64, user_id: i64) -> Result<balances::Model, Error> {
        if let Some(balance) = balances::Entity::find_by_id((guild_id, user_id))
            .one(&self.db)
            .await?
        {
            return Ok(balance);
        }

        ensure_balance_row(&self.db, guild_id, user_id, Utc::now().naive_utc()).await?;
        balances::Entity::find_by_id((guild_id, user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("balance row missing after upsert"))
    }

    /// Top balances for a guild, points descending, ties broken by earliest
    /// creation.
    pub async fn top_n(&self, guild_id: i64, n: u64) -> Result<Vec<balances::Model>, Error> {
        Ok(balances::Entity::find()
            .filter(balances::Column::GuildId.eq(guild_id))
            .order_by_desc(balances::Column::Points)
            .order_by_asc(balances::Column::CreatedAt)
            .limit(n)
            .all(&self.db)
            .await?)
    }

    /// One newest-first page of a user's audit log.
    pub async fn history(
        &self,
        guild_id: i64,
        user_id: i64,
        page: u64,
        per_page: u64,
    ) -> Result<Vec<point_transactions::Model>, Error> {
        Ok(point_transactions::Entity::find()
            .filter(point_transactions::Column::GuildId.eq(guild_id))
            .filter(point_transactions::Column::UserId.eq(user_id))
            .order_by_desc(point_transactions::Column::Id)
            .paginate(&self.db, per_page)
            .fetch_page(page)
            .await?)
    }

    pub async fn admin_add(
        &self,
        guild_id: i64,
        user_id: i64,
        amount: i64,
        reason: Option<&str>,
        actor_id: i64,
    ) -> Result<balances::Model, Error> {
        if amount <= 0 {
            anyhow::bail!("amount must be positive");
        }
        self.apply(
            guild_id,
            user_id,
            amount,
            TransactionKind::AdminAdd,
            TransactionSource::Admin,
            reason,
            Some(actor_id),
        )
        .await
    }

    pub async fn admin_remove(
        &self,
        guild_id: i64,
        user_id: i64,
        amount: i64,
        reason: Option<&str>,
        actor_id: i64,
    ) -> Result<balances::Model, Error> {
        if amount <= 0 {
            anyhow::bail!("amount must be positive");
        }
        self.apply(
            guild_id,
            user_id,
            -amount,
            TransactionKind::AdminRemove,
            TransactionSource::Admin,
            reason,
            Some(actor_id),
        )
        .await
    }

    /// Zeroes every non-zero balance in a guild, one RESET transaction per
    /// balance so the audit trail stays complete. Returns how many balances
    /// were zeroed.
    pub async fn reset_guild(&self, guild_id: i64, actor_id: i64) -> Result<u64, Error> {
        let rows = balances::Entity::find()
            .filter(balances::Column::GuildId.eq(guild_id))
            .filter(balances::Column::Points.ne(0))
            .all(&self.db)
            .await?;

        let mut zeroed = 0u64;
        for row in rows {
            self.apply(
                guild_id,
                row.user_id,
                -row.points,
                TransactionKind::Reset,
                TransactionSource::Admin,
                Some("guild reset"),
                Some(actor_id),
            )
            .await?;
            zeroed += 1;
        }

        Ok(zeroed)
    }
}

/// Insert-or-ignore of the zero balance row for (guild, user).
pub(crate) async fn ensure_balance_row<C: ConnectionTrait>(
    conn: &C,
    guild_id: i64,
    user_id: i64,
    now: NaiveDateTime,
) -> Result<(), Error> {
    balances::Entity::insert(balances::ActiveModel {
        guild_id: Set(guild_id),
        user_id: Set(user_id),
        points: Set(0),
        frozen_until: Set(None),
        created_at: Set(now),
    })
    .on_conflict(
        OnConflict::columns([balances::Column::GuildId, balances::Column::UserId])
            .do_nothing()
            .to_owned(),
    )
    .do_nothing()
    .exec_without_returning(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util;
    use std::sync::Arc;

    const GUILD: i64 = 100;
    const USER: i64 = 200;

    fn service(db: &DatabaseConnection) -> LedgerService {
        LedgerService::new(db.clone())
    }

    async fn tx_count(db: &DatabaseConnection) -> u64 {
        point_transactions::Entity::find().count(db).await.unwrap()
    }

    #[tokio::test]
    async fn balance_never_goes_negative() {
        let db = test_util::connect().await;
        let ledger = service(&db);

        ledger
            .apply(
                GUILD,
                USER,
                5,
                TransactionKind::Chat,
                TransactionSource::System,
                None,
                None,
            )
            .await
            .unwrap();
        let after = ledger
            .apply(
                GUILD,
                USER,
                -10,
                TransactionKind::AdminRemove,
                TransactionSource::Admin,
                None,
                Some(1),
            )
            .await
            .unwrap();

        assert_eq!(after.points, 0);
    }

    #[tokio::test]
    async fn every_mutation_writes_exactly_one_audit_row() {
        let db = test_util::connect().await;
        let ledger = service(&db);

        for delta in [5, -2, 3] {
            ledger
                .apply(
                    GUILD,
                    USER,
                    delta,
                    TransactionKind::Chat,
                    TransactionSource::System,
                    None,
                    None,
                )
                .await
                .unwrap();
        }

        assert_eq!(tx_count(&db).await, 3);
        assert_eq!(ledger.get_balance(GUILD, USER).await.unwrap().points, 6);
    }

    #[tokio::test]
    async fn concurrent_applies_do_not_lose_updates() {
        let db = test_util::connect().await;
        let ledger = Arc::new(service(&db));

        let a = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger
                    .apply(
                        GUILD,
                        USER,
                        5,
                        TransactionKind::Chat,
                        TransactionSource::System,
                        None,
                        None,
                    )
                    .await
            })
        };
        let b = {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger
                    .apply(
                        GUILD,
                        USER,
                        7,
                        TransactionKind::Call,
                        TransactionSource::System,
                        None,
                        None,
                    )
                    .await
            })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(ledger.get_balance(GUILD, USER).await.unwrap().points, 12);
        assert_eq!(tx_count(&db).await, 2);
    }

    #[tokio::test]
    async fn get_balance_creates_the_zero_row_lazily() {
        let db = test_util::connect().await;
        let ledger = service(&db);

        let balance = ledger.get_balance(GUILD, USER).await.unwrap();
        assert_eq!(balance.points, 0);
        assert_eq!(tx_count(&db).await, 0);
    }

    #[tokio::test]
    async fn top_n_orders_by_points_then_creation() {
        let db = test_util::connect().await;
        let ledger = service(&db);

        // User 1 reaches 10 first, user 2 ties later, user 3 trails.
        ledger
            .apply(
                GUILD,
                1,
                10,
                TransactionKind::Chat,
                TransactionSource::System,
                None,
                None,
            )
            .await
            .unwrap();
        ledger
            .apply(
                GUILD,
                2,
                10,
                TransactionKind::Chat,
                TransactionSource::System,
                None,
                None,
            )
            .await
            .unwrap();
        ledger
            .apply(
                GUILD,
                3,
                4,
                TransactionKind::Chat,
                TransactionSource::System,
                None,
                None,
            )
            .await
            .unwrap();

        let top = ledger.top_n(GUILD, 2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].points, 10);
        assert_eq!(top[1].points, 10);
        assert!(top[0].created_at <= top[1].created_at);
    }

    #[tokio::test]
    async fn admin_ops_validate_the_amount() {
        let db = test_util::connect().await;
        let ledger = service(&db);

        assert!(ledger.admin_add(GUILD, USER, 0, None, 1).await.is_err());
        assert!(ledger.admin_remove(GUILD, USER, -5, None, 1).await.is_err());
        assert_eq!(tx_count(&db).await, 0);
    }

    #[tokio::test]
    async fn reset_records_one_reset_row_per_balance() {
        let db = test_util::connect().await;
        let ledger = service(&db);

        for user in [1, 2] {
            ledger
                .apply(
                    GUILD,
                    user,
                    8,
                    TransactionKind::Chat,
                    TransactionSource::System,
                    None,
                    None,
                )
                .await
                .unwrap();
        }
        // Zero-point row must not produce a RESET transaction.
        ledger.get_balance(GUILD, 3).await.unwrap();

        let zeroed = ledger.reset_guild(GUILD, 42).await.unwrap();
        assert_eq!(zeroed, 2);

        for user in [1, 2, 3] {
            assert_eq!(ledger.get_balance(GUILD, user).await.unwrap().points, 0);
        }

        let resets = point_transactions::Entity::find()
            .filter(point_transactions::Column::Kind.eq(TransactionKind::Reset))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(resets.len(), 2);
        assert!(resets.iter().all(|t| t.amount == -8 && t.actor_id == Some(42)));
    }

    #[tokio::test]
    async fn history_pages_newest_first() {
        let db = test_util::connect().await;
        let ledger = service(&db);

        for delta in 1..=5 {
            ledger
                .apply(
                    GUILD,
                    USER,
                    delta,
                    TransactionKind::Chat,
                    TransactionSource::System,
                    None,
                    None,
                )
                .await
                .unwrap();
        }

        let first = ledger.history(GUILD, USER, 0, 2).await.unwrap();
        assert_eq!(
            first.iter().map(|t| t.amount).collect::<Vec<_>>(),
            vec![5, 4]
        );
        let last = ledger.history(GUILD, USER, 2, 2).await.unwrap();
        assert_eq!(last.iter().map(|t| t.amount).collect::<Vec<_>>(), vec![1]);
    }
}
