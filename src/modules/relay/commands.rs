use crate::{Context, Data, Error};
use poise::{
    command,
    serenity_prelude::{self as serenity, CreateAttachment, CreateMessage, EditMessage},
    Modal,
};
use tracing::error;

#[derive(Debug, Modal)]
#[name = "Compose message"]
struct ComposeModal {
    #[name = "Message"]
    #[paragraph]
    #[placeholder = "What should I say?"]
    #[max_length = 2000]
    content: String,
}

fn parse_message_id(input: &str) -> Option<u64> {
    input.trim().parse().ok()
}

/// Speak through the bot in a channel
#[command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES", ephemeral)]
pub async fn send(
    app_ctx: poise::ApplicationContext<'_, Data, Error>,
    #[description = "Channel to post in"]
    #[channel_types("Text", "News")]
    channel: serenity::Channel,
    #[description = "File to attach"] file: Option<serenity::Attachment>,
) -> Result<(), Error> {
    let Some(input) = ComposeModal::execute(app_ctx).await? else {
        return Ok(());
    };
    let ctx = Context::Application(app_ctx);

    let target = match channel.guild() {
        Some(channel) => channel,
        None => {
            ctx.say("❌ Please select a text channel.").await?;
            return Ok(());
        }
    };

    let mut message = CreateMessage::new().content(input.content);
    if let Some(file) = file {
        match CreateAttachment::url(ctx.serenity_context(), &file.url).await {
            Ok(attachment) => message = message.add_file(attachment),
            Err(e) => {
                error!("Failed to mirror attachment {}: {}", file.url, e);
                ctx.say("❌ I couldn't fetch that file.").await?;
                return Ok(());
            }
        }
    }

    match target.send_message(ctx.serenity_context(), message).await {
        Ok(sent) => {
            ctx.say(format!("✅ Sent! {}", sent.link())).await?;
        }
        Err(e) => {
            error!("Failed to relay message to {}: {}", target.id, e);
            ctx.say("❌ I couldn't post there. Check my permissions in that channel.")
                .await?;
        }
    }
    Ok(())
}

/// Post a file through the bot
#[command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES", ephemeral)]
pub async fn sendfile(
    ctx: Context<'_>,
    #[description = "Channel to post in"]
    #[channel_types("Text", "News")]
    channel: serenity::Channel,
    #[description = "File to attach"] file: serenity::Attachment,
    #[description = "Text to go with it"] text: Option<String>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let target = match channel.guild() {
        Some(channel) => channel,
        None => {
            ctx.say("❌ Please select a text channel.").await?;
            return Ok(());
        }
    };

    let attachment = match CreateAttachment::url(ctx.serenity_context(), &file.url).await {
        Ok(attachment) => attachment,
        Err(e) => {
            error!("Failed to mirror attachment {}: {}", file.url, e);
            ctx.say("❌ I couldn't fetch that file.").await?;
            return Ok(());
        }
    };

    let mut message = CreateMessage::new().add_file(attachment);
    if let Some(text) = text {
        message = message.content(text);
    }
    match target.send_message(ctx.serenity_context(), message).await {
        Ok(sent) => {
            ctx.say(format!("✅ Sent! {}", sent.link())).await?;
        }
        Err(e) => {
            error!("Failed to relay file to {}: {}", target.id, e);
            ctx.say("❌ I couldn't post there. Check my permissions in that channel.")
                .await?;
        }
    }
    Ok(())
}

/// Rewrite a message the bot sent earlier in this channel
#[command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES", ephemeral)]
pub async fn edit(
    app_ctx: poise::ApplicationContext<'_, Data, Error>,
    #[description = "ID of the message to edit"] message_id: String,
) -> Result<(), Error> {
    let ctx = Context::Application(app_ctx);

    let Some(message_id) = parse_message_id(&message_id) else {
        ctx.say("❌ That doesn't look like a message ID.").await?;
        return Ok(());
    };
    let channel = ctx.channel_id();
    let message = serenity::MessageId::new(message_id);

    let existing = match channel.message(ctx.serenity_context(), message).await {
        Ok(existing) => existing,
        Err(_) => {
            ctx.say("❌ I can't see that message.").await?;
            return Ok(());
        }
    };
    if existing.author.id != ctx.framework().bot_id {
        ctx.say("❌ I can only edit my own messages.").await?;
        return Ok(());
    }

    let defaults = ComposeModal {
        content: existing.content.clone(),
    };
    let Some(input) = ComposeModal::execute_with_defaults(app_ctx, defaults).await? else {
        return Ok(());
    };

    match channel
        .edit_message(
            ctx.serenity_context(),
            message,
            EditMessage::new().content(input.content),
        )
        .await
    {
        Ok(edited) => {
            ctx.say(format!("✅ Updated! {}", edited.link())).await?;
        }
        Err(e) => {
            error!("Failed to edit relayed message {}: {}", message_id, e);
            ctx.say("❌ The edit didn't go through.").await?;
        }
    }
    Ok(())
}

/// Send a direct message through the bot
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR", ephemeral)]
pub async fn dm(
    app_ctx: poise::ApplicationContext<'_, Data, Error>,
    #[description = "Member to message"] user: serenity::User,
) -> Result<(), Error> {
    if user.bot {
        let ctx = Context::Application(app_ctx);
        ctx.say("❌ Bots don't read their DMs.").await?;
        return Ok(());
    }

    let Some(input) = ComposeModal::execute(app_ctx).await? else {
        return Ok(());
    };
    let ctx = Context::Application(app_ctx);

    match user
        .dm(
            ctx.serenity_context(),
            CreateMessage::new().content(input.content),
        )
        .await
    {
        Ok(_) => {
            ctx.say(format!("📨 Delivered to {}!", user.name)).await?;
        }
        Err(e) => {
            error!("Failed to DM {}: {}", user.id, e);
            ctx.say("❌ Couldn't deliver. They may have DMs closed.")
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_message_id;

    #[test]
    fn pasted_ids_resolve() {
        assert_eq!(parse_message_id("1184629450448785519"), Some(1184629450448785519));
        assert_eq!(parse_message_id("  789\n"), Some(789));
    }

    #[test]
    fn garbage_ids_are_rejected() {
        assert_eq!(parse_message_id("https://discord.com/channels/123/456/789"), None);
        assert_eq!(parse_message_id("not an id"), None);
        assert_eq!(parse_message_id(""), None);
    }
}
