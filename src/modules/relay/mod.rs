pub mod commands;

use commands::*;
use poise::command;

/// 📨 Relay messages and files through the bot
#[command(slash_command, guild_only, subcommands("send", "sendfile", "edit"))]
pub async fn message(_ctx: crate::Context<'_>) -> Result<(), crate::Error> {
    Ok(())
}
