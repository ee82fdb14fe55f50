use crate::{database::Database, events::EventHandler};
use async_trait::async_trait;
use dashmap::DashMap;
use poise::serenity_prelude::{
    ChannelId, Context, CreateAllowedMentions, CreateMessage, EditChannel, FullEvent, GetMessages,
    Message,
};
use rand::{seq::SliceRandom, Rng};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::database::CreditDatabase;

const REPLY_PROBABILITY: f64 = 1.0;
const REPLY_COOLDOWN: Duration = Duration::from_secs(3);
const RENAME_MIN_INTERVAL: Duration = Duration::from_secs(2);
const CLEANUP_FETCH_LIMIT: u8 = 50;
const LATEST_FETCH_LIMIT: u8 = 10;

const THANK_YOU_REPLIES: &[&str] = &[
    "Thanks for the review! 💖",
    "Your review keeps the shop going! 🙏",
    "Much appreciated! ✨",
    "Thank you for trusting us! 💕",
    "You're the best! ⭐",
    "Review received — thank you! 📝",
    "We loved reading that! 😊",
    "See you again soon! 🛍️",
];

pub fn review_channel_name(count: u64) -> String {
    format!("⭐・reviews・{}", count)
}

/// Counts member reviews in the configured channel, keeps the channel name in
/// sync with the count, and thanks the reviewer. Counting always happens;
/// the thank-you reply is best-effort on top.
#[derive(Debug, Clone)]
pub struct CreditHandler {
    db: Database<CreditDatabase>,
    reply_stamps: Arc<DashMap<(u64, u64), Instant>>,
    rename_stamps: Arc<DashMap<u64, Instant>>,
}

impl CreditHandler {
    pub fn new(db: Database<CreditDatabase>) -> Self {
        Self {
            db,
            reply_stamps: Arc::new(DashMap::new()),
            rename_stamps: Arc::new(DashMap::new()),
        }
    }

    async fn on_message(
        &self,
        ctx: &Context,
        message: &Message,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if message.author.bot {
            return Ok(());
        }
        let Some(guild_id) = message.guild_id else {
            return Ok(());
        };
        let guild_id = guild_id.get();

        let Some(channel_id) = self.db.review_channel(guild_id).await else {
            return Ok(());
        };
        if message.channel_id.get() != channel_id {
            return Ok(());
        }
        // Replies in the channel are chatter, not reviews.
        if message.message_reference.is_some() {
            return Ok(());
        }

        let count = self.db.increment_count(guild_id).await?;
        self.schedule_rename(ctx, guild_id, channel_id, count);

        if !rand::thread_rng().gen_bool(REPLY_PROBABILITY) {
            return Ok(());
        }

        let stamp_key = (guild_id, message.author.id.get());
        if let Some(last) = self.reply_stamps.get(&stamp_key) {
            if last.elapsed() < REPLY_COOLDOWN {
                return Ok(());
            }
        }
        self.reply_stamps.insert(stamp_key, Instant::now());

        if !self.is_latest_human_message(ctx, message).await? {
            return Ok(());
        }

        self.delete_previous_replies(ctx, message.channel_id).await;

        let line = THANK_YOU_REPLIES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("Thanks for the review! 💖");
        let reply = CreateMessage::new()
            .content(line)
            .reference_message(message)
            .allowed_mentions(CreateAllowedMentions::new().replied_user(false));
        message.channel_id.send_message(&ctx.http, reply).await?;

        Ok(())
    }

    /// Whether the message is still the newest human message in its channel.
    /// Replying to anything older would bury the actual conversation.
    async fn is_latest_human_message(
        &self,
        ctx: &Context,
        message: &Message,
    ) -> Result<bool, poise::serenity_prelude::Error> {
        let recent = message
            .channel_id
            .messages(&ctx.http, GetMessages::new().limit(LATEST_FETCH_LIMIT))
            .await?;
        Ok(recent
            .iter()
            .find(|m| !m.author.bot)
            .map(|m| m.id == message.id)
            .unwrap_or(true))
    }

    /// Removes the bot's earlier thank-you replies so only one is visible.
    async fn delete_previous_replies(&self, ctx: &Context, channel_id: ChannelId) {
        let bot_id = ctx.cache.current_user().id;
        let recent = match channel_id
            .messages(&ctx.http, GetMessages::new().limit(CLEANUP_FETCH_LIMIT))
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                debug!("Failed to fetch messages for reply cleanup: {}", e);
                return;
            }
        };

        for old in recent
            .iter()
            .filter(|m| m.author.id == bot_id && m.message_reference.is_some())
        {
            if let Err(e) = old.delete(&ctx.http).await {
                debug!("Failed to delete old reply {}: {}", old.id, e);
            }
        }
    }

    fn schedule_rename(&self, ctx: &Context, guild_id: u64, channel_id: u64, count: u64) {
        if let Some(last) = self.rename_stamps.get(&guild_id) {
            if last.elapsed() < RENAME_MIN_INTERVAL {
                return;
            }
        }
        self.rename_stamps.insert(guild_id, Instant::now());

        let ctx = ctx.clone();
        let new_name = review_channel_name(count);
        tokio::spawn(async move {
            let channel = ChannelId::new(channel_id);
            let current = ctx.cache.channel(channel).map(|c| c.name.clone());
            if current.as_deref() == Some(new_name.as_str()) {
                return;
            }
            if let Err(e) = channel
                .edit(&ctx.http, EditChannel::default().name(&new_name))
                .await
            {
                warn!("Failed to rename review channel {}: {}", channel_id, e);
            }
        });
    }

    /// Brings stored counts and channel names back in line after a restart.
    async fn sync_channel_names(&self, ctx: &Context) {
        for (guild_id, config) in self.db.all_configs().await {
            let new_name = review_channel_name(config.count);
            let channel = ChannelId::new(config.channel_id);

            let current = ctx.cache.channel(channel).map(|c| c.name.clone());
            if current.as_deref() == Some(new_name.as_str()) {
                continue;
            }

            match timeout(
                Duration::from_secs(5),
                channel.edit(&ctx.http, EditChannel::default().name(&new_name)),
            )
            .await
            {
                Ok(Ok(_)) => {
                    self.rename_stamps.insert(guild_id, Instant::now());
                }
                Ok(Err(e)) => warn!("Failed to sync review channel {}: {}", config.channel_id, e),
                Err(_) => warn!("Timeout syncing review channel {}", config.channel_id),
            }
        }
    }
}

#[async_trait]
impl EventHandler for CreditHandler {
    fn name(&self) -> &str {
        "Credit"
    }

    async fn handle(
        &self,
        ctx: &Context,
        event: &FullEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match event {
            FullEvent::Message { new_message } => self.on_message(ctx, new_message).await,
            FullEvent::Ready { .. } => {
                self.sync_channel_names(ctx).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn box_clone(&self) -> Box<dyn EventHandler> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_name_embeds_the_count() {
        assert_eq!(review_channel_name(0), "⭐・reviews・0");
        assert_eq!(review_channel_name(137), "⭐・reviews・137");
    }
}
