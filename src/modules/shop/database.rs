use crate::database::Database;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopConfig {
    /// Channel the open/close announcement goes to.
    pub announce_channel: Option<u64>,
    /// Last announcement we posted, edited in place on later flips.
    pub message_id: Option<u64>,
    /// Customer chat that gets locked while the shop is closed.
    pub talk_channel: Option<u64>,
    /// Role mentioned (spoilered, never pinged) in announcements.
    pub mention_role: Option<u64>,
}

#[derive(Default, Serialize, Deserialize, Clone, Debug)]
pub struct ShopDatabase {
    pub configs: HashMap<u64, ShopConfig>,
}

impl Database<ShopDatabase> {
    pub async fn config(&self, guild_id: u64) -> ShopConfig {
        self.read(|db| db.configs.get(&guild_id).cloned().unwrap_or_default())
            .await
    }

    /// Updates the channel wiring. `None` keeps the current talk channel or
    /// role. Switching the announce channel forgets the remembered message
    /// so the next flip posts a fresh one.
    pub async fn set_channels(
        &self,
        guild_id: u64,
        announce_channel: u64,
        talk_channel: Option<u64>,
        mention_role: Option<u64>,
    ) -> Result<(), String> {
        self.transaction(|db| {
            let config = db.configs.entry(guild_id).or_default();
            if config.announce_channel != Some(announce_channel) {
                config.message_id = None;
            }
            config.announce_channel = Some(announce_channel);
            if let Some(channel) = talk_channel {
                config.talk_channel = Some(channel);
            }
            if let Some(role) = mention_role {
                config.mention_role = Some(role);
            }
            Ok(())
        })
        .await
        .map_err(|e| e.to_string())
    }

    pub async fn remember_message(&self, guild_id: u64, message_id: u64) -> Result<(), String> {
        self.transaction(|db| {
            db.configs.entry(guild_id).or_default().message_id = Some(message_id);
            Ok(())
        })
        .await
        .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unspecified_fields_keep_their_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.json");
        let db: Database<ShopDatabase> = Database::new(path.to_str().unwrap()).await.unwrap();

        db.set_channels(1, 10, Some(20), Some(30)).await.unwrap();
        db.set_channels(1, 10, None, None).await.unwrap();

        let config = db.config(1).await;
        assert_eq!(config.announce_channel, Some(10));
        assert_eq!(config.talk_channel, Some(20));
        assert_eq!(config.mention_role, Some(30));
    }

    #[tokio::test]
    async fn switching_announce_channel_forgets_the_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.json");
        let db: Database<ShopDatabase> = Database::new(path.to_str().unwrap()).await.unwrap();

        db.set_channels(1, 10, None, None).await.unwrap();
        db.remember_message(1, 99).await.unwrap();
        assert_eq!(db.config(1).await.message_id, Some(99));

        db.set_channels(1, 10, None, None).await.unwrap();
        assert_eq!(db.config(1).await.message_id, Some(99));

        db.set_channels(1, 11, None, None).await.unwrap();
        assert_eq!(db.config(1).await.message_id, None);
    }
}
