use crate::{Context, Error};
use poise::{
    command,
    serenity_prelude::{self as serenity, Mentionable},
};

/// Set the channel where member reviews are counted
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn setup(
    ctx: Context<'_>,
    #[description = "Text channel where reviews are posted"]
    #[channel_types("Text")]
    channel: serenity::Channel,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().unwrap().get();

    let text_channel = match channel.guild() {
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
            Ok(guild.user_permissions_in(&text_channel, bot_member))
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

    let mut missing = Vec::new();
    if !bot_permissions.send_messages() {
        missing.push("send messages");
    }
    if !bot_permissions.read_message_history() {
        missing.push("read message history");
    }
    if !bot_permissions.manage_channels() {
        missing.push("manage channels (for the counter rename)");
    }

    let count = match ctx
        .data()
        .dbs
        .credit
        .set_review_channel(guild_id, text_channel.id.get())
        .await
    {
        Ok(count) => count,
        Err(_) => {
            ctx.say("❌ Failed to save the review channel. Please try again later.")
                .await?;
            return Ok(());
        }
    };

    let mut response = format!(
        "✅ Reviews will be counted in {} (current count: {}).",
        text_channel.mention(),
        count
    );
    if !missing.is_empty() {
        response.push_str(&format!(
            "\n⚠️ I'm missing permissions there: {}.",
            missing.join(", ")
        ));
    }

    ctx.say(response).await?;
    Ok(())
}
