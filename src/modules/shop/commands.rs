use crate::{Context, Error};
use poise::{
    command,
    serenity_prelude::{
        self as serenity, CreateAllowedMentions, CreateEmbed, CreateEmbedFooter, CreateMessage,
        EditChannel, EditMessage, Mentionable, PermissionOverwrite, PermissionOverwriteType,
        Permissions,
    },
};
use tracing::{error, warn};

const OPEN_COLOR: u32 = 0xE784C2;
const CLOSED_COLOR: u32 = 0xE91E63;

/// Wire up the announcement channel, customer chat and mention role
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn set(
    ctx: Context<'_>,
    #[description = "Channel for open/close announcements"]
    #[channel_types("Text", "News")]
    announce_channel: serenity::Channel,
    #[description = "Customer chat locked while the shop is closed"]
    #[channel_types("Text")]
    talk_channel: Option<serenity::Channel>,
    #[description = "Role mentioned in announcements"] mention_role: Option<serenity::Role>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().unwrap().get();

    let announce = match announce_channel.guild() {
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
            Ok(guild.user_permissions_in(&announce, bot_member))
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

    if !bot_permissions.send_messages() || !bot_permissions.embed_links() {
        ctx.say("❌ I need permission to send messages and embed links in that channel.")
            .await?;
        return Ok(());
    }

    let talk = match talk_channel {
        Some(channel) => match channel.guild() {
            Some(channel) => Some(channel.id.get()),
            None => {
                ctx.say("❌ The customer chat has to be a text channel.")
                    .await?;
                return Ok(());
            }
        },
        None => None,
    };

    match ctx
        .data()
        .dbs
        .shop
        .set_channels(
            guild_id,
            announce.id.get(),
            talk,
            mention_role.map(|role| role.id.get()),
        )
        .await
    {
        Ok(_) => {
            ctx.say(format!(
                "✅ Shop announcements will go to {}. Flip the sign with `/status open` and `/status close`!",
                announce.mention()
            ))
            .await?;
        }
        Err(e) => {
            error!("Failed to save shop settings for guild {}: {}", guild_id, e);
            ctx.say("❌ Failed to save those settings. Please try again later.")
                .await?;
        }
    }
    Ok(())
}

/// Announce the shop as open
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn open(ctx: Context<'_>) -> Result<(), Error> {
    flip(ctx, true).await
}

/// Announce the shop as closed
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn close(ctx: Context<'_>) -> Result<(), Error> {
    flip(ctx, false).await
}

async fn flip(ctx: Context<'_>, open: bool) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let guild_id = ctx.guild_id().unwrap().get();
    let config = ctx.data().dbs.shop.config(guild_id).await;
    let Some(channel_id) = config.announce_channel else {
        ctx.say("❌ No announcement channel configured. Run `/status set` first.")
            .await?;
        return Ok(());
    };
    let channel = serenity::ChannelId::new(channel_id);

    let (color, title, line, emoji) = if open {
        (
            OPEN_COLOR,
            "🟢 The shop is open!",
            "Come on in! We're taking orders right now. 🛍️",
            "🟢",
        )
    } else {
        (
            CLOSED_COLOR,
            "🔴 The shop is closed",
            "We're off restocking. Orders resume when the sign flips back! 🌙",
            "🔴",
        )
    };
    let embed = CreateEmbed::new()
        .title(title)
        .description(line)
        .color(color)
        .footer(CreateEmbedFooter::new(format!(
            "Updated {}",
            chrono::Utc::now().format("%b %e, %Y at %H:%M UTC")
        )));
    let content = config
        .mention_role
        .map(|role_id| format!("||<@&{}>||", role_id))
        .unwrap_or_default();

    let mut updated = false;
    if let Some(message_id) = config.message_id {
        let edit = EditMessage::new()
            .content(content.clone())
            .embed(embed.clone())
            .allowed_mentions(CreateAllowedMentions::new().empty_roles().empty_users());
        updated = channel
            .edit_message(
                ctx.serenity_context(),
                serenity::MessageId::new(message_id),
                edit,
            )
            .await
            .is_ok();
    }
    if !updated {
        let announcement = CreateMessage::new()
            .content(content)
            .embed(embed)
            .allowed_mentions(CreateAllowedMentions::new().empty_roles().empty_users());
        match channel
            .send_message(ctx.serenity_context(), announcement)
            .await
        {
            Ok(sent) => {
                if let Err(e) = ctx
                    .data()
                    .dbs
                    .shop
                    .remember_message(guild_id, sent.id.get())
                    .await
                {
                    error!("Failed to remember shop message for guild {}: {}", guild_id, e);
                }
            }
            Err(e) => {
                error!("Failed to announce shop status in guild {}: {}", guild_id, e);
                ctx.say("❌ I couldn't post in the announcement channel.")
                    .await?;
                return Ok(());
            }
        }
    }

    if let (Some(talk_id), Some(role_id)) = (config.talk_channel, config.mention_role) {
        let role = serenity::RoleId::new(role_id);
        let overwrite = if open {
            PermissionOverwrite {
                allow: Permissions::SEND_MESSAGES,
                deny: Permissions::empty(),
                kind: PermissionOverwriteType::Role(role),
            }
        } else {
            PermissionOverwrite {
                allow: Permissions::empty(),
                deny: Permissions::SEND_MESSAGES,
                kind: PermissionOverwriteType::Role(role),
            }
        };
        if let Err(e) = serenity::ChannelId::new(talk_id)
            .create_permission(&ctx.serenity_context().http, overwrite)
            .await
        {
            warn!("Failed to toggle customer chat in guild {}: {}", guild_id, e);
        }
    }

    rename_status_channel(ctx.serenity_context(), channel, emoji).await;

    ctx.say(if open {
        "✅ The sign now says open."
    } else {
        "✅ The sign now says closed."
    })
    .await?;
    Ok(())
}

/// Swaps the leading status emoji on the announcement channel's name.
fn status_channel_name(current: &str, emoji: &str) -> String {
    let stripped = current.trim_start_matches("🟢").trim_start_matches("🔴");
    format!("{}{}", emoji, stripped)
}

async fn rename_status_channel(ctx: &serenity::Context, channel: serenity::ChannelId, emoji: &str) {
    let current = ctx.cache.channel(channel).map(|c| c.name.clone());
    let Some(current) = current else {
        return;
    };
    let renamed = status_channel_name(&current, emoji);
    if renamed == current {
        return;
    }
    if let Err(e) = channel
        .edit(&ctx.http, EditChannel::default().name(&renamed))
        .await
    {
        warn!("Failed to rename status channel {}: {}", channel, e);
    }
}

#[cfg(test)]
mod tests {
    use super::status_channel_name;

    #[test]
    fn sign_emoji_is_swapped_in_place() {
        assert_eq!(status_channel_name("🔴shop-status", "🟢"), "🟢shop-status");
        assert_eq!(status_channel_name("🟢shop-status", "🔴"), "🔴shop-status");
    }

    #[test]
    fn renaming_is_idempotent() {
        assert_eq!(status_channel_name("🟢shop-status", "🟢"), "🟢shop-status");
    }

    #[test]
    fn bare_names_gain_the_sign() {
        assert_eq!(status_channel_name("shop-status", "🟢"), "🟢shop-status");
    }
}
