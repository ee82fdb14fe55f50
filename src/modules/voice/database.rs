use crate::database::Database;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Desired voice presence for one guild. Entries are never deleted;
/// disabling just flips the flag so re-enabling keeps the history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepConfig {
    pub channel_id: u64,
    pub enabled: bool,
}

#[derive(Default, Serialize, Deserialize, Clone, Debug)]
pub struct KeeperDatabase {
    pub configs: HashMap<u64, KeepConfig>,
}

impl Database<KeeperDatabase> {
    pub async fn enable_keep(&self, guild_id: u64, channel_id: u64) -> Result<(), String> {
        self.transaction(|db| {
            db.configs.insert(
                guild_id,
                KeepConfig {
                    channel_id,
                    enabled: true,
                },
            );
            Ok(())
        })
        .await
        .map_err(|e| e.to_string())
    }

    pub async fn disable_keep(&self, guild_id: u64) -> Result<(), String> {
        self.transaction(|db| {
            if let Some(config) = db.configs.get_mut(&guild_id) {
                config.enabled = false;
            }
            Ok(())
        })
        .await
        .map_err(|e| e.to_string())
    }

    pub async fn keep_config(&self, guild_id: u64) -> Option<KeepConfig> {
        self.read(|db| db.configs.get(&guild_id).cloned()).await
    }

    /// Guilds the supervisor should currently hold a connection for,
    /// as `(guild_id, channel_id)` pairs.
    pub async fn enabled_targets(&self) -> Vec<(u64, u64)> {
        self.read(|db| {
            db.configs
                .iter()
                .filter(|(_, config)| config.enabled)
                .map(|(guild_id, config)| (*guild_id, config.channel_id))
                .collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn keeper_db(dir: &tempfile::TempDir) -> Database<KeeperDatabase> {
        let path = dir.path().join("voice_keeper.json");
        Database::new(path.to_str().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn disable_without_entry_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let db = keeper_db(&dir).await;

        db.disable_keep(42).await.unwrap();
        assert!(db.keep_config(42).await.is_none());
    }

    #[tokio::test]
    async fn enable_overwrites_channel_and_flag() {
        let dir = tempfile::tempdir().unwrap();
        let db = keeper_db(&dir).await;

        db.enable_keep(1, 100).await.unwrap();
        db.enable_keep(1, 200).await.unwrap();

        let config = db.keep_config(1).await.unwrap();
        assert_eq!(config.channel_id, 200);
        assert!(config.enabled);
    }

    #[tokio::test]
    async fn disable_keeps_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let db = keeper_db(&dir).await;

        db.enable_keep(1, 100).await.unwrap();
        db.disable_keep(1).await.unwrap();

        let config = db.keep_config(1).await.unwrap();
        assert_eq!(config.channel_id, 100);
        assert!(!config.enabled);

        db.enable_keep(1, 300).await.unwrap();
        let config = db.keep_config(1).await.unwrap();
        assert_eq!(config.channel_id, 300);
        assert!(config.enabled);
    }

    #[tokio::test]
    async fn enabled_targets_skip_disabled_guilds() {
        let dir = tempfile::tempdir().unwrap();
        let db = keeper_db(&dir).await;

        db.enable_keep(1, 100).await.unwrap();
        db.enable_keep(2, 200).await.unwrap();
        db.disable_keep(2).await.unwrap();

        let targets = db.enabled_targets().await;
        assert_eq!(targets, vec![(1, 100)]);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = keeper_db(&dir).await;
            db.enable_keep(9, 900).await.unwrap();
        }

        let db = keeper_db(&dir).await;
        let config = db.keep_config(9).await.unwrap();
        assert_eq!(config.channel_id, 900);
        assert!(config.enabled);
    }
}
