use crate::{tasks::Task, utils::format_duration};
use poise::serenity_prelude::{ActivityData, Context, OnlineStatus};
use std::time::{Duration, Instant};

const ROTATION_INTERVAL: Duration = Duration::from_secs(20);

/// Cycles the status line between the storefront tagline, uptime and the
/// server count.
#[derive(Clone)]
pub struct PresenceTask {
    started: Instant,
    slot: usize,
}

impl PresenceTask {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            slot: 0,
        }
    }
}

#[async_trait::async_trait]
impl Task for PresenceTask {
    fn name(&self) -> &str {
        "PresenceRotation"
    }

    fn schedule(&self) -> Option<Duration> {
        Some(ROTATION_INTERVAL)
    }

    async fn execute(
        &mut self,
        ctx: &Context,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let activity = match self.slot % 3 {
            0 => ActivityData::watching("the storefront"),
            1 => ActivityData::watching(format!(
                "uptime {}",
                format_duration(self.started.elapsed())
            )),
            _ => ActivityData::watching(format!("{} servers", ctx.cache.guilds().len())),
        };
        self.slot = self.slot.wrapping_add(1);
        ctx.set_presence(Some(activity), OnlineStatus::Online);
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Task> {
        Box::new(self.clone())
    }
}
