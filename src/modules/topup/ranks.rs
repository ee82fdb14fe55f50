use super::database::{rank_assignments, sorted_entries, TopupDatabase};
use crate::database::Database;
use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

/// Grants `role_id` to the member unless they already hold it. Checks that
/// the role still exists, that the bot may manage roles and that the role
/// sits below the bot's highest one before touching the API.
pub async fn ensure_member_role(
    ctx: &serenity::Context,
    guild_id: u64,
    member: &serenity::Member,
    role_id: u64,
) {
    let role = serenity::RoleId::new(role_id);
    if member.roles.contains(&role) {
        return;
    }

    let bot_id = ctx.cache.current_user().id;
    let check = {
        let Some(guild) = ctx.cache.guild(serenity::GuildId::new(guild_id)) else {
            return;
        };
        match guild.roles.get(&role) {
            Some(target) => {
                let bot_top = guild
                    .members
                    .get(&bot_id)
                    .map(|bot| {
                        bot.roles
                            .iter()
                            .filter_map(|r| guild.roles.get(r))
                            .map(|r| r.position)
                            .max()
                            .unwrap_or(0)
                    })
                    .unwrap_or(0);
                let can_manage = guild
                    .members
                    .get(&bot_id)
                    .map(|bot| guild.member_permissions(bot).manage_roles())
                    .unwrap_or(false);
                Some((can_manage, target.position < bot_top))
            }
            None => None,
        }
    };

    match check {
        None => warn!("Configured role {} no longer exists in guild {}", role_id, guild_id),
        Some((false, _)) => warn!("Missing Manage Roles to grant role {} in guild {}", role_id, guild_id),
        Some((_, false)) => warn!("Role {} sits above my top role in guild {}", role_id, guild_id),
        Some((true, true)) => {
            if let Err(e) = member.add_role(ctx, role).await {
                warn!("Failed to grant role {} to {}: {}", role_id, member.user.id, e);
            }
        }
    }
}

/// Walks the member list and reconciles the top-1 and top-5 roles against
/// the current leaderboard. Members outside the board lose the roles.
pub async fn refresh_rank_roles(
    ctx: &serenity::Context,
    guild_id: u64,
    db: &Database<TopupDatabase>,
) {
    let settings = db.get_settings(guild_id).await;
    let (top1_role, top5_role) = (settings.top1_role, settings.top5_role);
    if top1_role.is_none() && top5_role.is_none() {
        return;
    }

    let sorted = sorted_entries(&db.guild_accounts(guild_id).await);
    let (top1, top5) = rank_assignments(&sorted);

    let guild = match ctx.http.get_guild(serenity::GuildId::new(guild_id)).await {
        Ok(guild) => guild,
        Err(e) => {
            warn!("Failed to fetch guild {} for rank refresh: {}", guild_id, e);
            return;
        }
    };

    let mut after = None;
    loop {
        let members = match guild.members(&ctx.http, Some(1000), after).await {
            Ok(members) => members,
            Err(e) => {
                warn!("Failed to list members of guild {}: {}", guild_id, e);
                return;
            }
        };
        if members.is_empty() {
            break;
        }
        after = members.last().map(|m| m.user.id);

        for member in &members {
            let user_id = member.user.id.get();
            if let Some(role_id) = top1_role {
                reconcile_role(ctx, member, role_id, top1 == Some(user_id)).await;
            }
            if let Some(role_id) = top5_role {
                reconcile_role(ctx, member, role_id, top5.contains(&user_id)).await;
            }
        }
        if members.len() < 1000 {
            break;
        }
    }
    debug!("Refreshed rank roles for guild {}", guild_id);
}

async fn reconcile_role(
    ctx: &serenity::Context,
    member: &serenity::Member,
    role_id: u64,
    should_hold: bool,
) {
    let role = serenity::RoleId::new(role_id);
    let holds = member.roles.contains(&role);
    let result = if should_hold && !holds {
        member.add_role(ctx, role).await
    } else if !should_hold && holds {
        member.remove_role(ctx, role).await
    } else {
        return;
    };
    if let Err(e) = result {
        warn!("Failed to reconcile role {} on {}: {}", role_id, member.user.id, e);
    }
}
