pub mod commands;
pub mod database;
pub mod ranks;

use commands::*;
use poise::command;

/// 💖 Top-up records, leaderboard and reward roles
#[command(
    slash_command,
    guild_only,
    subcommands("add", "update", "delete", "check", "list", "total", "rank", "roles")
)]
pub async fn topup(_ctx: crate::Context<'_>) -> Result<(), crate::Error> {
    Ok(())
}
