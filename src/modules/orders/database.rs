use crate::database::Database;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdersConfig {
    pub log_channel: Option<u64>,
    /// Lifetime delivered-order count. Zero means "not seeded yet" and
    /// triggers a one-off recount from the log channel's history.
    pub delivered: u64,
}

#[derive(Default, Serialize, Deserialize, Clone, Debug)]
pub struct OrdersDatabase {
    pub configs: HashMap<u64, OrdersConfig>,
}

impl Database<OrdersDatabase> {
    pub async fn config(&self, guild_id: u64) -> OrdersConfig {
        self.read(|db| db.configs.get(&guild_id).cloned().unwrap_or_default())
            .await
    }

    pub async fn set_log_channel(&self, guild_id: u64, channel_id: u64) -> Result<(), String> {
        self.transaction(|db| {
            db.configs.entry(guild_id).or_default().log_channel = Some(channel_id);
            Ok(())
        })
        .await
        .map_err(|e| e.to_string())
    }

    /// Backfills the counter from a history scan. Only applies while the
    /// counter is still zero so a slow scan can't clobber live increments.
    pub async fn seed_delivered(&self, guild_id: u64, count: u64) -> Result<u64, String> {
        self.transaction(|db| {
            let config = db.configs.entry(guild_id).or_default();
            if config.delivered == 0 {
                config.delivered = count;
            }
            Ok(config.delivered)
        })
        .await
        .map_err(|e| e.to_string())
    }

    pub async fn increment_delivered(&self, guild_id: u64) -> Result<u64, String> {
        self.transaction(|db| {
            let config = db.configs.entry(guild_id).or_default();
            config.delivered += 1;
            Ok(config.delivered)
        })
        .await
        .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counter_runs_from_the_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.json");
        let db: Database<OrdersDatabase> = Database::new(path.to_str().unwrap()).await.unwrap();

        assert_eq!(db.seed_delivered(1, 41).await.unwrap(), 41);
        assert_eq!(db.increment_delivered(1).await.unwrap(), 42);
        assert_eq!(db.increment_delivered(1).await.unwrap(), 43);
    }

    #[tokio::test]
    async fn seeding_never_overwrites_a_live_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.json");
        let db: Database<OrdersDatabase> = Database::new(path.to_str().unwrap()).await.unwrap();

        db.increment_delivered(1).await.unwrap();
        assert_eq!(db.seed_delivered(1, 99).await.unwrap(), 1);
        assert_eq!(db.config(1).await.delivered, 1);
    }

    #[tokio::test]
    async fn guilds_count_independently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.json");
        let db: Database<OrdersDatabase> = Database::new(path.to_str().unwrap()).await.unwrap();

        db.set_log_channel(1, 10).await.unwrap();
        db.increment_delivered(1).await.unwrap();

        let untouched = db.config(2).await;
        assert_eq!(untouched.log_channel, None);
        assert_eq!(untouched.delivered, 0);
    }
}
