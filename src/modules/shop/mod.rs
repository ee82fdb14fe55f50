pub mod commands;
pub mod database;

use commands::*;
use poise::command;

/// 🛍️ Open and close the shop front
#[command(slash_command, guild_only, subcommands("set", "open", "close"))]
pub async fn status(_ctx: crate::Context<'_>) -> Result<(), crate::Error> {
    Ok(())
}
