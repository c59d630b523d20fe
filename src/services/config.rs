use crate::Error;
use crate::db::entities::economy_configs::{self, EconomyConfig};
use crate::services::cache::TtlCache;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use std::time::Duration;

const CONFIG_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct ConfigSnapshot {
    enabled: bool,
    config: EconomyConfig,
}

/// Per-guild economy settings behind a short TTL cache. A missing row
/// behaves as disabled; every write invalidates the cache entry.
pub struct ConfigService {
    db: DatabaseConnection,
    cache: TtlCache<i64, ConfigSnapshot>,
}

impl ConfigService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            cache: TtlCache::new(CONFIG_CACHE_TTL),
        }
    }

    /// Returns the guild config only when the economy is enabled there.
    pub async fn get_enabled(&self, guild_id: i64) -> Result<Option<EconomyConfig>, Error> {
        let snapshot = self.snapshot(guild_id).await?;
        if !snapshot.enabled {
            return Ok(None);
        }
        Ok(Some(snapshot.config))
    }

    /// Returns the stored config (or defaults), regardless of the enabled
    /// flag. Used by the admin surface.
    pub async fn get(&self, guild_id: i64) -> Result<EconomyConfig, Error> {
        Ok(self.snapshot(guild_id).await?.config)
    }

    pub async fn is_enabled(&self, guild_id: i64) -> Result<bool, Error> {
        Ok(self.snapshot(guild_id).await?.enabled)
    }

    async fn snapshot(&self, guild_id: i64) -> Result<ConfigSnapshot, Error> {
        if let Some(hit) = self.cache.get(&guild_id) {
            return Ok(hit);
        }

        let row = economy_configs::Entity::find_by_id(guild_id)
            .one(&self.db)
            .await?;

        let snapshot = match row {
            Some(m) => ConfigSnapshot {
                enabled: m.enabled,
                config: serde_json::from_value(m.config).unwrap_or_default(),
            },
            None => ConfigSnapshot {
                enabled: false,
                config: EconomyConfig::default(),
            },
        };

        self.cache.insert(guild_id, snapshot.clone());
        Ok(snapshot)
    }

    pub async fn set(
        &self,
        guild_id: i64,
        enabled: bool,
        config: EconomyConfig,
    ) -> Result<(), Error> {
        let model = economy_configs::ActiveModel {
            guild_id: Set(guild_id),
            enabled: Set(enabled),
            config: Set(serde_json::to_value(&config)?),
        };

        economy_configs::Entity::insert(model)
            .on_conflict(
                OnConflict::column(economy_configs::Column::GuildId)
                    .update_columns([
                        economy_configs::Column::Enabled,
                        economy_configs::Column::Config,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        self.cache.invalidate(&guild_id);
        Ok(())
    }

    pub async fn set_enabled(&self, guild_id: i64, enabled: bool) -> Result<(), Error> {
        let config = self.get(guild_id).await?;
        self.set(guild_id, enabled, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util;

    #[tokio::test]
    async fn missing_row_behaves_as_disabled() {
        let db = test_util::connect().await;
        let service = ConfigService::new(db);

        assert!(service.get_enabled(1).await.unwrap().is_none());
        assert!(!service.is_enabled(1).await.unwrap());
    }

    #[tokio::test]
    async fn set_and_read_back_round_trips() {
        let db = test_util::connect().await;
        let service = ConfigService::new(db);

        let mut config = EconomyConfig::default();
        config.chat.points = 7;
        config.ignored_users = vec![99];
        service.set(1, true, config).await.unwrap();

        let loaded = service.get_enabled(1).await.unwrap().unwrap();
        assert_eq!(loaded.chat.points, 7);
        assert_eq!(loaded.ignored_users, vec![99]);
    }

    #[tokio::test]
    async fn disabling_keeps_the_stored_config() {
        let db = test_util::connect().await;
        let service = ConfigService::new(db);

        let mut config = EconomyConfig::default();
        config.voice.block_minutes = 10;
        service.set(1, true, config).await.unwrap();
        service.set_enabled(1, false).await.unwrap();

        assert!(service.get_enabled(1).await.unwrap().is_none());
        assert_eq!(service.get(1).await.unwrap().voice.block_minutes, 10);
    }
}
