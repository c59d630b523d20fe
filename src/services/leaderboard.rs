use crate::Error;
use crate::db::entities::balances;
use crate::services::ledger::LedgerService;
use dashmap::DashMap;
use sea_orm::{DatabaseConnection, EntityTrait, QuerySelect};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info};

/// Entries materialized per guild.
pub const BOARD_SIZE: u64 = 10;

const PUBLISH_INTERVAL_SECONDS: u64 = 300;

/// Read-only consumer of the ledger: periodically materializes each guild's
/// top balances for cheap display reads. Never mutates engine state.
pub struct LeaderboardService {
    db: DatabaseConnection,
    ledger: Arc<LedgerService>,
    boards: DashMap<i64, Vec<balances::Model>>,
}

impl LeaderboardService {
    pub fn new(db: DatabaseConnection, ledger: Arc<LedgerService>) -> Self {
        Self {
            db,
            ledger,
            boards: DashMap::new(),
        }
    }

    /// Rebuilds the board of every guild present in the balance store.
    pub async fn publish_once(&self) -> Result<(), Error> {
        let guild_ids: Vec<i64> = balances::Entity::find()
            .select_only()
            .column(balances::Column::GuildId)
            .distinct()
            .into_tuple()
            .all(&self.db)
            .await?;

        for guild_id in guild_ids {
            let top = self.ledger.top_n(guild_id, BOARD_SIZE).await?;
            self.boards.insert(guild_id, top);
        }

        Ok(())
    }

    /// Last materialized board for a guild, if any.
    pub fn cached(&self, guild_id: i64) -> Option<Vec<balances::Model>> {
        self.boards.get(&guild_id).map(|board| board.clone())
    }

    pub fn start_publish_runner(self: &Arc<Self>) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            info!("Leaderboard publish runner started.");
            loop {
                sleep(std::time::Duration::from_secs(PUBLISH_INTERVAL_SECONDS)).await;
                if let Err(e) = service.publish_once().await {
                    error!("Leaderboard publish failed: {:?}", e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::point_transactions::{TransactionKind, TransactionSource};
    use crate::db::test_util;

    #[tokio::test]
    async fn publishes_per_guild_boards() {
        let db = test_util::connect().await;
        let ledger = Arc::new(LedgerService::new(db.clone()));
        let boards = LeaderboardService::new(db, ledger.clone());

        for (guild, user, points) in [(1, 10, 30), (1, 11, 50), (2, 10, 5)] {
            ledger
                .apply(
                    guild,
                    user,
                    points,
                    TransactionKind::Chat,
                    TransactionSource::System,
                    None,
                    None,
                )
                .await
                .unwrap();
        }

        assert!(boards.cached(1).is_none());
        boards.publish_once().await.unwrap();

        let board = boards.cached(1).unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].user_id, 11);
        assert_eq!(board[0].points, 50);

        let other = boards.cached(2).unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].points, 5);
    }
}
