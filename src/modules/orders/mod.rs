pub mod commands;
pub mod database;

use commands::*;
use poise::command;

/// 📦 Delivered-order logging
#[command(slash_command, guild_only, subcommands("add", "channel"))]
pub async fn order(_ctx: crate::Context<'_>) -> Result<(), crate::Error> {
    Ok(())
}
