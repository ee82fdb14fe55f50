pub mod commands;
pub mod database;
pub mod handler;

use poise::command;

/// ⭐ Review counting for your storefront
#[command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    subcommands("commands::setup")
)]
pub async fn credit(_ctx: crate::Context<'_>) -> Result<(), crate::Error> {
    Ok(())
}
