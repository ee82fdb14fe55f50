use crate::events::EventHandler;
use async_trait::async_trait;
use poise::serenity_prelude::{Context, FullEvent};
use std::sync::Arc;
use tracing::info;

use super::keeper::VoiceKeeper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    /// The bot had a channel and now has none.
    Disconnected,
    /// The bot sits in a channel other than the configured one.
    MovedAway,
}

/// Classifies a voice-state change for the bot against the configured
/// target channel. `None` means the change needs no reaction.
pub fn classify(target: u64, old: Option<u64>, new: Option<u64>) -> Option<Drift> {
    match (old, new) {
        (Some(_), None) => Some(Drift::Disconnected),
        (_, Some(channel)) if channel != target => Some(Drift::MovedAway),
        _ => None,
    }
}

/// Reacts to the platform's voice-state events for the bot itself and asks
/// the keeper to recover. The heartbeat task covers anything this misses.
#[derive(Debug, Clone)]
pub struct VoiceDriftHandler {
    keeper: Arc<VoiceKeeper>,
}

impl VoiceDriftHandler {
    pub fn new(keeper: Arc<VoiceKeeper>) -> Self {
        Self { keeper }
    }
}

#[async_trait]
impl EventHandler for VoiceDriftHandler {
    fn name(&self) -> &str {
        "VoiceDrift"
    }

    async fn handle(
        &self,
        ctx: &Context,
        event: &FullEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match event {
            FullEvent::VoiceStateUpdate { old, new } => {
                let Some(guild_id) = new.guild_id else {
                    return Ok(());
                };
                if new.user_id != ctx.cache.current_user().id {
                    return Ok(());
                }

                let Some(target) = self.keeper.active_target(guild_id.get()).await else {
                    return Ok(());
                };

                let old_channel = old.as_ref().and_then(|s| s.channel_id).map(|c| c.get());
                let new_channel = new.channel_id.map(|c| c.get());

                if let Some(drift) = classify(target, old_channel, new_channel) {
                    info!(
                        "Voice drift in guild {}: {:?}, scheduling rejoin to {}",
                        guild_id, drift, target
                    );
                    self.keeper.schedule_rejoin(ctx, guild_id.get(), target);
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn box_clone(&self) -> Box<dyn EventHandler> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: u64 = 500;

    #[test]
    fn losing_the_channel_is_a_disconnect() {
        assert_eq!(
            classify(TARGET, Some(TARGET), None),
            Some(Drift::Disconnected)
        );
    }

    #[test]
    fn landing_in_another_channel_is_a_move() {
        assert_eq!(
            classify(TARGET, Some(TARGET), Some(123)),
            Some(Drift::MovedAway)
        );
        // Appearing in the wrong channel needs fixing regardless of where
        // the bot came from.
        assert_eq!(classify(TARGET, None, Some(123)), Some(Drift::MovedAway));
    }

    #[test]
    fn staying_in_the_target_channel_is_fine() {
        assert_eq!(classify(TARGET, Some(TARGET), Some(TARGET)), None);
        assert_eq!(classify(TARGET, Some(123), Some(TARGET)), None);
        assert_eq!(classify(TARGET, None, Some(TARGET)), None);
    }

    #[test]
    fn no_channel_on_either_side_is_fine() {
        assert_eq!(classify(TARGET, None, None), None);
    }
}
