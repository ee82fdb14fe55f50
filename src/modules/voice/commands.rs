use crate::{Context, Error};
use poise::{
    command,
    serenity_prelude::{self as serenity, ChannelType, Mentionable},
};
use tracing::error;

/// 🔊 Join a voice channel and stay there, reconnecting if dropped
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn join(
    ctx: Context<'_>,
    #[description = "Voice channel to occupy (defaults to yours)"]
    #[channel_types("Voice", "Stage")]
    channel: Option<serenity::Channel>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let guild_id = ctx.guild_id().unwrap().get();

    let explicit = match channel {
        Some(channel) => match channel.guild() {
            Some(guild_channel)
                if matches!(guild_channel.kind, ChannelType::Voice | ChannelType::Stage) =>
            {
                Some(guild_channel.id)
            }
            _ => {
                ctx.say("❌ Please pick a voice channel.").await?;
                return Ok(());
            }
        },
        None => None,
    };

    let target = match explicit {
        Some(id) => id,
        None => {
            let invoker_channel = {
                let guild = ctx.guild().unwrap();
                guild
                    .voice_states
                    .get(&ctx.author().id)
                    .and_then(|state| state.channel_id)
            };
            match invoker_channel {
                Some(id) => id,
                None => {
                    ctx.say("❌ Join a voice channel first, or pass one explicitly.")
                        .await?;
                    return Ok(());
                }
            }
        }
    };

    let keeper = &ctx.data().keeper;
    match keeper
        .join_now(ctx.serenity_context(), guild_id, target.get())
        .await
    {
        Ok(()) => {
            if let Err(e) = keeper.enable(guild_id, target.get()).await {
                error!("Failed to save keep config for guild {}: {}", guild_id, e);
                ctx.say("⚠️ Connected, but saving the keep-alive setting failed.")
                    .await?;
                return Ok(());
            }
            ctx.say(format!(
                "✅ Connected to {}. I'll hold the channel and reconnect if dropped.",
                target.mention()
            ))
            .await?;
        }
        Err(e) => {
            ctx.say(format!("❌ Could not connect: {}", e)).await?;
        }
    }

    Ok(())
}

/// 👋 Leave the voice channel and stop reconnecting
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn leave(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let guild_id = ctx.guild_id().unwrap().get();
    let keeper = &ctx.data().keeper;

    let had_connection = keeper.current_connection(guild_id).is_some();
    keeper.drop_connection(guild_id).await;

    if let Err(e) = keeper.disable(guild_id).await {
        error!("Failed to disable keep for guild {}: {}", guild_id, e);
        ctx.say("❌ Failed to update the keep-alive setting. Please try again later.")
            .await?;
        return Ok(());
    }

    if had_connection {
        ctx.say("👋 Left the voice channel and disabled keep-alive.")
            .await?;
    } else {
        ctx.say("ℹ️ I wasn't in a voice channel; keep-alive is now disabled.")
            .await?;
    }

    Ok(())
}
