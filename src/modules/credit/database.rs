use crate::database::Database;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditConfig {
    pub channel_id: u64,
    pub count: u64,
}

#[derive(Default, Serialize, Deserialize, Clone, Debug)]
pub struct CreditDatabase {
    pub configs: HashMap<u64, CreditConfig>,
}

impl Database<CreditDatabase> {
    pub async fn review_channel(&self, guild_id: u64) -> Option<u64> {
        self.read(|db| db.configs.get(&guild_id).map(|config| config.channel_id))
            .await
    }

    /// Points the counter at a new channel, keeping any count accumulated so
    /// far. Returns the current count.
    pub async fn set_review_channel(&self, guild_id: u64, channel_id: u64) -> Result<u64, String> {
        self.transaction(|db| {
            let config = db.configs.entry(guild_id).or_insert(CreditConfig {
                channel_id,
                count: 0,
            });
            config.channel_id = channel_id;
            Ok(config.count)
        })
        .await
        .map_err(|e| e.to_string())
    }

    pub async fn increment_count(&self, guild_id: u64) -> Result<u64, String> {
        self.transaction(|db| {
            let config = db
                .configs
                .get_mut(&guild_id)
                .ok_or_else(|| "no review channel configured".to_string())?;
            config.count += 1;
            Ok(config.count)
        })
        .await
        .map_err(|e| e.to_string())
    }

    pub async fn all_configs(&self) -> Vec<(u64, CreditConfig)> {
        self.read(|db| {
            db.configs
                .iter()
                .map(|(guild_id, config)| (*guild_id, config.clone()))
                .collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn credit_db(dir: &tempfile::TempDir) -> Database<CreditDatabase> {
        let path = dir.path().join("credit.json");
        Database::new(path.to_str().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn reconfiguring_keeps_the_count() {
        let dir = tempfile::tempdir().unwrap();
        let db = credit_db(&dir).await;

        assert_eq!(db.set_review_channel(1, 10).await.unwrap(), 0);
        db.increment_count(1).await.unwrap();
        db.increment_count(1).await.unwrap();

        let count = db.set_review_channel(1, 20).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(db.review_channel(1).await, Some(20));
    }

    #[tokio::test]
    async fn increment_returns_the_running_total() {
        let dir = tempfile::tempdir().unwrap();
        let db = credit_db(&dir).await;

        db.set_review_channel(1, 10).await.unwrap();
        assert_eq!(db.increment_count(1).await.unwrap(), 1);
        assert_eq!(db.increment_count(1).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn increment_without_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let db = credit_db(&dir).await;

        assert!(db.increment_count(1).await.is_err());
        assert!(db.review_channel(1).await.is_none());
    }
}
