use crate::tasks::Task;
use async_trait::async_trait;
use poise::serenity_prelude::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::keeper::VoiceKeeper;

/// True when the observed connection does not satisfy the configured target.
pub fn needs_rejoin(target: u64, live: Option<u64>) -> bool {
    live != Some(target)
}

/// Periodic backstop for the event-driven drift handler: walks every enabled
/// guild and reconciles the live connection against the configured channel.
#[derive(Debug, Clone)]
pub struct KeeperHeartbeatTask {
    keeper: Arc<VoiceKeeper>,
}

impl KeeperHeartbeatTask {
    pub fn new(keeper: Arc<VoiceKeeper>) -> Self {
        Self { keeper }
    }
}

#[async_trait]
impl Task for KeeperHeartbeatTask {
    fn name(&self) -> &str {
        "KeeperHeartbeat"
    }

    fn schedule(&self) -> Option<Duration> {
        Some(self.keeper.heartbeat_interval())
    }

    async fn execute(
        &mut self,
        ctx: &Context,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let targets = self.keeper.enabled_targets().await;
        debug!("Heartbeat checking {} enabled guild(s)", targets.len());

        for (guild_id, channel_id) in targets {
            let live = self.keeper.connected_channel(guild_id).await;
            if needs_rejoin(channel_id, live) {
                debug!(
                    "Guild {} should be in {} but is in {:?}, scheduling rejoin",
                    guild_id, channel_id, live
                );
                self.keeper.schedule_rejoin(ctx, guild_id, channel_id);
            }
        }

        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Task> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_connection_needs_rejoin() {
        assert!(needs_rejoin(100, None));
    }

    #[test]
    fn wrong_channel_needs_rejoin() {
        assert!(needs_rejoin(100, Some(200)));
    }

    #[test]
    fn matching_channel_is_left_alone() {
        assert!(!needs_rejoin(100, Some(100)));
    }
}
