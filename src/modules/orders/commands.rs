use crate::{Context, Error};
use poise::{
    command,
    serenity_prelude::{
        self as serenity, CreateAllowedMentions, CreateEmbed, CreateMessage, EditChannel,
        GetMessages, Mentionable, Timestamp,
    },
};
use tracing::{error, warn};

const ORDER_COLOR: u32 = 0x00FF94;
const HISTORY_PAGE: u8 = 100;

fn order_channel_name(count: u64) -> String {
    format!("⭐・deliveries・{}", count)
}

/// Walks the log channel and counts previously logged orders, so the counter
/// picks up where an earlier deployment left off.
async fn count_logged_orders(ctx: &serenity::Context, channel: serenity::ChannelId) -> u64 {
    let bot_id = ctx.cache.current_user().id;
    let mut total = 0u64;
    let mut cursor: Option<serenity::MessageId> = None;
    loop {
        let mut request = GetMessages::new().limit(HISTORY_PAGE);
        if let Some(before) = cursor {
            request = request.before(before);
        }
        let batch = match channel.messages(&ctx.http, request).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Order history scan of {} stopped early: {}", channel, e);
                break;
            }
        };
        if batch.is_empty() {
            break;
        }
        cursor = batch.last().map(|m| m.id);
        total += batch
            .iter()
            .filter(|m| m.author.id == bot_id && !m.embeds.is_empty())
            .count() as u64;
        if batch.len() < HISTORY_PAGE as usize {
            break;
        }
    }
    total
}

async fn rename_order_channel(ctx: &serenity::Context, channel: serenity::ChannelId, count: u64) {
    let new_name = order_channel_name(count);
    let unchanged = ctx
        .cache
        .channel(channel)
        .map(|c| c.name == new_name)
        .unwrap_or(false);
    if unchanged {
        return;
    }
    if let Err(e) = channel
        .edit(&ctx.http, EditChannel::default().name(&new_name))
        .await
    {
        warn!("Failed to rename order channel {}: {}", channel, e);
    }
}

/// Log a delivered order and thank the customer
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Customer who ordered"] customer: serenity::User,
    #[description = "What they bought"] item: String,
    #[description = "Price paid"] price: f64,
    #[description = "How many"]
    #[min = 1]
    quantity: Option<u64>,
    #[description = "Payment slip screenshot"] slip: Option<serenity::Attachment>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let guild_id = ctx.guild_id().unwrap().get();
    let config = ctx.data().dbs.orders.config(guild_id).await;
    let Some(log_id) = config.log_channel else {
        ctx.say("❌ No order log channel configured. Run `/order channel` first.")
            .await?;
        return Ok(());
    };
    let log_channel = serenity::ChannelId::new(log_id);

    if config.delivered == 0 {
        let counted = count_logged_orders(ctx.serenity_context(), log_channel).await;
        if counted > 0 {
            if let Err(e) = ctx.data().dbs.orders.seed_delivered(guild_id, counted).await {
                error!("Failed to seed order counter for guild {}: {}", guild_id, e);
            }
        }
    }

    let number = match ctx.data().dbs.orders.increment_delivered(guild_id).await {
        Ok(number) => number,
        Err(e) => {
            error!("Failed to bump order counter for guild {}: {}", guild_id, e);
            ctx.say("❌ Unable to log that order. Please try again later.")
                .await?;
            return Ok(());
        }
    };

    let quantity = quantity.unwrap_or(1);
    let mut record = CreateEmbed::new()
        .title(format!("📦 Order #{}", number))
        .color(ORDER_COLOR)
        .field("Customer", customer.mention().to_string(), true)
        .field("Item", item.clone(), true)
        .field("Quantity", quantity.to_string(), true)
        .field("Price", format!("{:.2}", price), true)
        .thumbnail(customer.face())
        .timestamp(Timestamp::now());
    if let Some(slip) = &slip {
        record = record.image(&slip.url);
    }

    if let Err(e) = log_channel
        .send_message(
            ctx.serenity_context(),
            CreateMessage::new()
                .embed(record)
                .allowed_mentions(CreateAllowedMentions::new().empty_roles().empty_users()),
        )
        .await
    {
        error!("Failed to write order log in guild {}: {}", guild_id, e);
        ctx.say("⚠️ Counted the order, but I couldn't post to the log channel.")
            .await?;
        return Ok(());
    }

    let thanks = CreateMessage::new()
        .content(format!(
            "🎉 Thank you {} for purchasing **{}**! Enjoy! 💖",
            customer.mention(),
            item
        ))
        .allowed_mentions(CreateAllowedMentions::new().users(vec![customer.id]));
    if let Err(e) = ctx
        .channel_id()
        .send_message(ctx.serenity_context(), thanks)
        .await
    {
        warn!("Failed to thank customer in guild {}: {}", guild_id, e);
    }

    rename_order_channel(ctx.serenity_context(), log_channel, number).await;

    ctx.say(format!("✅ Logged order #{}.", number)).await?;
    Ok(())
}

/// Choose where delivered orders get logged
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn channel(
    ctx: Context<'_>,
    #[description = "Channel for order logs"]
    #[channel_types("Text")]
    channel: serenity::Channel,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().unwrap().get();

    let log = match channel.guild() {
        Some(channel) => channel,
        None => {
            ctx.say("❌ Please select a text channel.").await?;
            return Ok(());
        }
    };

    let bot_permissions = match {
        let guild = ctx.guild().unwrap();
        let bot_member = guild.members.get(&ctx.framework().bot_id);
        if let Some(bot_member) = bot_member {
            Ok(guild.user_permissions_in(&log, bot_member))
        } else {
            Err(())
        }
    } {
        Ok(perms) => perms,
        Err(_) => {
            ctx.say("❌ Failed to verify bot permissions. Please try again.")
                .await?;
            return Ok(());
        }
    };

    if !bot_permissions.send_messages() || !bot_permissions.read_message_history() {
        ctx.say("❌ I need permission to send messages and read message history in that channel.")
            .await?;
        return Ok(());
    }

    match ctx
        .data()
        .dbs
        .orders
        .set_log_channel(guild_id, log.id.get())
        .await
    {
        Ok(_) => {
            ctx.say(format!("✅ Delivered orders will be logged in {}.", log.mention()))
                .await?;
        }
        Err(e) => {
            error!("Failed to save order channel for guild {}: {}", guild_id, e);
            ctx.say("❌ Failed to save that channel. Please try again later.")
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::order_channel_name;

    #[test]
    fn channel_name_tracks_the_count() {
        assert_eq!(order_channel_name(1), "⭐・deliveries・1");
        assert_eq!(order_channel_name(250), "⭐・deliveries・250");
    }
}
