use super::{
    database::{rank_assignments, sorted_entries, TopupEntry},
    ranks::{ensure_member_role, refresh_rank_roles},
};
use crate::{Context, Data, Error};
use poise::{
    command,
    serenity_prelude::{
        self as serenity, ButtonStyle, CreateActionRow, CreateAllowedMentions, CreateButton,
        CreateEmbed, CreateEmbedFooter, CreateInteractionResponse,
        CreateInteractionResponseMessage, CreateMessage, Mentionable, Timestamp,
    },
    CreateReply, Modal,
};
use tracing::error;

const FIRST_CARD_COLOR: u32 = 0xFFC163;
const RETURN_CARD_COLOR: u32 = 0xE46DAF;
const BOARD_COLOR: u32 = 0xE46DAF;
const INFO_COLOR: u32 = 0x00AE86;
const ENTRIES_PER_PAGE: usize = 20;

/// Record a top-up and post the member's thank-you card
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Member who topped up"] user: serenity::User,
    #[description = "Amount they added"]
    #[min = 1]
    amount: u64,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let guild_id = ctx.guild_id().unwrap().get();

    let (totals, first_time) = match ctx
        .data()
        .dbs
        .topup
        .add_amount(guild_id, user.id.get(), amount)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            error!("Failed to record top-up in guild {}: {}", guild_id, e);
            ctx.say("❌ Unable to record that top-up. Please try again later.")
                .await?;
            return Ok(());
        }
    };

    let settings = ctx.data().dbs.topup.get_settings(guild_id).await;
    let (display_name, avatar) = match serenity::GuildId::new(guild_id).member(ctx, user.id).await {
        Ok(member) => {
            if let Some(role_id) = settings.customer_role {
                ensure_member_role(ctx.serenity_context(), guild_id, &member, role_id).await;
            }
            if settings.qualifies_for_upgrade(&totals) {
                if let Some(role_id) = settings.upgrade_role {
                    ensure_member_role(ctx.serenity_context(), guild_id, &member, role_id).await;
                }
            }
            (member.display_name().to_string(), member.face())
        }
        Err(_) => (user.name.clone(), user.face()),
    };

    refresh_rank_roles(ctx.serenity_context(), guild_id, &ctx.data().dbs.topup).await;

    let card = member_card(&display_name, &avatar, amount, &totals, first_time);
    let announcement = CreateMessage::new()
        .content(format!("||{}||", user.mention()))
        .embed(card)
        .allowed_mentions(CreateAllowedMentions::new().empty_roles().empty_users());
    if let Err(e) = ctx
        .channel_id()
        .send_message(ctx.serenity_context(), announcement)
        .await
    {
        error!("Failed to post top-up card in guild {}: {}", guild_id, e);
        ctx.say("⚠️ Recorded the top-up, but I couldn't post the card here.")
            .await?;
        return Ok(());
    }

    ctx.say(format!(
        "✅ Logged **{}** for {} (lifetime **{}** over {} top-ups).",
        amount,
        user.mention(),
        totals.amount,
        totals.count
    ))
    .await?;
    Ok(())
}

fn member_card(
    display_name: &str,
    avatar: &str,
    added: u64,
    totals: &TopupEntry,
    first_time: bool,
) -> CreateEmbed {
    let (color, title, lead) = if first_time {
        (
            FIRST_CARD_COLOR,
            format!("🎉 Welcome, {}!", display_name),
            "Thank you for your first top-up with us!",
        )
    } else {
        (
            RETURN_CARD_COLOR,
            format!("💖 Welcome back, {}!", display_name),
            "Another top-up in the books. You're amazing!",
        )
    };

    CreateEmbed::new()
        .title(title)
        .description(format!(
            "{}\n\n💵 This top-up: **{}**\n💰 Lifetime amount: **{}**\n🧾 Top-ups: **{}**\n\nClimb into the top 5 for exclusive perks! ✨",
            lead, added, totals.amount, totals.count
        ))
        .color(color)
        .thumbnail(avatar)
        .timestamp(Timestamp::now())
}

#[derive(Debug, Modal)]
#[name = "Edit member totals"]
struct EditTotalsModal {
    #[name = "Lifetime amount"]
    #[placeholder = "Leave blank to keep the current amount"]
    amount: Option<String>,
    #[name = "Top-up count"]
    #[placeholder = "Leave blank to keep the current count"]
    count: Option<String>,
}

fn parse_total(field: Option<String>) -> Result<Option<u64>, String> {
    match field.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| format!("\"{}\" is not a whole number", raw)),
        None => Ok(None),
    }
}

/// Overwrite a member's lifetime totals
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn update(
    app_ctx: poise::ApplicationContext<'_, Data, Error>,
    #[description = "Member to edit"] user: serenity::User,
) -> Result<(), Error> {
    let Some(input) = EditTotalsModal::execute(app_ctx).await? else {
        return Ok(());
    };
    let ctx = Context::Application(app_ctx);
    let guild_id = ctx.guild_id().unwrap().get();

    let (amount, count) = match (parse_total(input.amount), parse_total(input.count)) {
        (Ok(amount), Ok(count)) => (amount, count),
        (Err(e), _) | (_, Err(e)) => {
            ctx.say(format!("❌ {}.", e)).await?;
            return Ok(());
        }
    };
    if amount.is_none() && count.is_none() {
        ctx.say("❌ Nothing to change. Fill in at least one field.")
            .await?;
        return Ok(());
    }

    match ctx
        .data()
        .dbs
        .topup
        .set_totals(guild_id, user.id.get(), amount, count)
        .await
    {
        Ok(totals) => {
            refresh_rank_roles(ctx.serenity_context(), guild_id, &ctx.data().dbs.topup).await;
            ctx.say(format!(
                "✅ {} now stands at **{}** over **{}** top-ups.",
                user.mention(),
                totals.amount,
                totals.count
            ))
            .await?;
        }
        Err(e) => {
            error!("Failed to edit totals in guild {}: {}", guild_id, e);
            ctx.say("❌ Unable to save those totals. Please try again later.")
                .await?;
        }
    }
    Ok(())
}

/// Remove a member's top-up records
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn delete(
    ctx: Context<'_>,
    #[description = "Member to remove"] user: serenity::User,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let guild_id = ctx.guild_id().unwrap().get();

    match ctx
        .data()
        .dbs
        .topup
        .remove_entry(guild_id, user.id.get())
        .await
    {
        Ok(true) => {
            refresh_rank_roles(ctx.serenity_context(), guild_id, &ctx.data().dbs.topup).await;
            ctx.say(format!("🗑️ Removed all top-up records for {}.", user.mention()))
                .await?;
        }
        Ok(false) => {
            ctx.say(format!("ℹ️ {} has no top-up records.", user.mention()))
                .await?;
        }
        Err(e) => {
            error!("Failed to delete totals in guild {}: {}", guild_id, e);
            ctx.say("❌ Unable to delete those records. Please try again later.")
                .await?;
        }
    }
    Ok(())
}

/// Look up a member's lifetime totals
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR", ephemeral)]
pub async fn check(
    ctx: Context<'_>,
    #[description = "Member to look up"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().unwrap().get();

    match ctx.data().dbs.topup.entry(guild_id, user.id.get()).await {
        Some(totals) => {
            let embed = CreateEmbed::new()
                .title("🔎 Member totals")
                .description(format!(
                    "{}\n💰 Lifetime amount: **{}**\n🧾 Top-ups: **{}**",
                    user.mention(),
                    totals.amount,
                    totals.count
                ))
                .color(INFO_COLOR)
                .thumbnail(user.face())
                .timestamp(Timestamp::now());
            ctx.send(CreateReply::default().embed(embed)).await?;
        }
        None => {
            ctx.say(format!("ℹ️ {} has no top-up records yet.", user.mention()))
                .await?;
        }
    }
    Ok(())
}

/// Browse the full top-up leaderboard
#[command(slash_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let guild_id = ctx.guild_id().unwrap().get();
    let sorted = sorted_entries(&ctx.data().dbs.topup.guild_accounts(guild_id).await);
    if sorted.is_empty() {
        ctx.say("📭 Nobody has topped up yet.").await?;
        return Ok(());
    }

    refresh_rank_roles(ctx.serenity_context(), guild_id, &ctx.data().dbs.topup).await;

    let total_pages = (sorted.len() as f32 / ENTRIES_PER_PAGE as f32).ceil() as usize;
    let mut current_page = 0;

    let page_embed = |page: usize| {
        let start = page * ENTRIES_PER_PAGE;
        let end = (start + ENTRIES_PER_PAGE).min(sorted.len());
        let mut lines = String::new();
        for (offset, (user_id, entry)) in sorted[start..end].iter().enumerate() {
            let position = start + offset + 1;
            let marker = match position {
                1 => "🥇".to_string(),
                2 => "🥈".to_string(),
                3 => "🥉".to_string(),
                n => format!("`#{:02}`", n),
            };
            lines.push_str(&format!(
                "{} <@{}> — 💰 **{}** · 🧾 {}\n",
                marker, user_id, entry.amount, entry.count
            ));
        }
        CreateEmbed::new()
            .title("💖 Top-up leaderboard")
            .description(lines)
            .color(BOARD_COLOR)
            .footer(CreateEmbedFooter::new(format!(
                "Page {}/{} · {} members",
                page + 1,
                total_pages,
                sorted.len()
            )))
            .timestamp(Timestamp::now())
    };

    let controls = |page: usize| {
        CreateActionRow::Buttons(vec![
            CreateButton::new("prev_page")
                .emoji('◀')
                .style(ButtonStyle::Secondary)
                .disabled(page == 0),
            CreateButton::new("next_page")
                .emoji('▶')
                .style(ButtonStyle::Secondary)
                .disabled(page >= total_pages - 1),
        ])
    };

    let components = if total_pages > 1 {
        vec![controls(current_page)]
    } else {
        vec![]
    };
    let msg = ctx
        .send(
            CreateReply::default()
                .embed(page_embed(current_page))
                .components(components),
        )
        .await?;

    if total_pages <= 1 {
        return Ok(());
    }

    while let Some(interaction) = msg
        .message()
        .await?
        .await_component_interaction(ctx)
        .author_id(ctx.author().id)
        .timeout(std::time::Duration::from_secs(120))
        .await
    {
        match interaction.data.custom_id.as_str() {
            "prev_page" => current_page = current_page.saturating_sub(1),
            "next_page" => current_page = (current_page + 1).min(total_pages - 1),
            _ => continue,
        }
        interaction
            .create_response(
                &ctx.serenity_context().http,
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .embed(page_embed(current_page))
                        .components(vec![controls(current_page)]),
                ),
            )
            .await?;
    }

    msg.edit(
        ctx,
        CreateReply::default()
            .embed(page_embed(current_page))
            .components(vec![]),
    )
    .await?;
    Ok(())
}

/// Show guild-wide top-up totals
#[command(slash_command, guild_only)]
pub async fn total(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().unwrap().get();
    let (amount, count, members) = ctx.data().dbs.topup.guild_totals(guild_id).await;

    let embed = CreateEmbed::new()
        .title("📊 Top-up totals")
        .description(format!(
            "👥 Members: **{}**\n💰 Combined amount: **{}**\n🧾 Combined top-ups: **{}**",
            members, amount, count
        ))
        .color(INFO_COLOR)
        .timestamp(Timestamp::now());
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show the current top supporters
#[command(slash_command, guild_only)]
pub async fn rank(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let guild_id = ctx.guild_id().unwrap().get();
    let sorted = sorted_entries(&ctx.data().dbs.topup.guild_accounts(guild_id).await);
    if sorted.is_empty() {
        ctx.say("📭 Nobody has topped up yet.").await?;
        return Ok(());
    }

    refresh_rank_roles(ctx.serenity_context(), guild_id, &ctx.data().dbs.topup).await;
    let (top1, _) = rank_assignments(&sorted);

    let mut description = String::new();
    if let (Some(leader), Some((_, entry))) = (top1, sorted.first()) {
        description.push_str(&format!(
            "👑 **Top supporter:** <@{}> — 💰 **{}**\n",
            leader, entry.amount
        ));
    }
    let runners: Vec<_> = sorted.iter().skip(1).take(4).collect();
    if !runners.is_empty() {
        description.push_str("\n🏅 **Runners-up:**\n");
        for (offset, (user_id, entry)) in runners.into_iter().enumerate() {
            description.push_str(&format!(
                "`#{}` <@{}> — 💰 **{}**\n",
                offset + 2,
                user_id,
                entry.amount
            ));
        }
    }

    let embed = CreateEmbed::new()
        .title("🏆 Top supporters")
        .description(description)
        .color(BOARD_COLOR)
        .timestamp(Timestamp::now());
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Configure reward roles and upgrade thresholds
#[command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn roles(
    ctx: Context<'_>,
    #[description = "Role granted on a first top-up"] customer_role: Option<serenity::Role>,
    #[description = "Role granted once a threshold is met"] upgrade_role: Option<serenity::Role>,
    #[description = "Role for the single top supporter"] top1_role: Option<serenity::Role>,
    #[description = "Role for ranks two through five"] top5_role: Option<serenity::Role>,
    #[description = "Lifetime amount that unlocks the upgrade role"] amount_threshold: Option<u64>,
    #[description = "Top-up count that unlocks the upgrade role"] count_threshold: Option<u64>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().unwrap().get();

    let nothing_given = customer_role.is_none()
        && upgrade_role.is_none()
        && top1_role.is_none()
        && top5_role.is_none()
        && amount_threshold.is_none()
        && count_threshold.is_none();
    if nothing_given {
        let settings = ctx.data().dbs.topup.get_settings(guild_id).await;
        let fmt_role =
            |id: Option<u64>| id.map_or("Not set".to_string(), |id| format!("<@&{}>", id));
        ctx.say(format!(
            "⚙️ **Top-up rewards**\n\
            🛍️ **Customer role:** {}\n\
            💎 **Upgrade role:** {}\n\
            👑 **Top 1 role:** {}\n\
            🏅 **Top 5 role:** {}\n\
            💰 **Amount threshold:** {}\n\
            🧾 **Count threshold:** {}",
            fmt_role(settings.customer_role),
            fmt_role(settings.upgrade_role),
            fmt_role(settings.top1_role),
            fmt_role(settings.top5_role),
            settings.amount_threshold,
            settings.count_threshold
        ))
        .await?;
        return Ok(());
    }

    let bot_top_role = {
        let guild = ctx.guild().unwrap();
        let bot_member = guild.members.get(&ctx.framework().bot_id);
        if let Some(bot_member) = bot_member {
            let bot_roles: Vec<_> = bot_member
                .roles
                .iter()
                .filter_map(|r| guild.roles.get(r))
                .cloned()
                .collect();
            bot_roles.into_iter().max_by_key(|r| r.position)
        } else {
            None
        }
    };

    let roles_to_validate: Vec<_> = [&customer_role, &upgrade_role, &top1_role, &top5_role]
        .iter()
        .filter_map(|r| r.as_ref())
        .collect();

    if let Some(top_role) = bot_top_role {
        for role in &roles_to_validate {
            if role.position >= top_role.position {
                ctx.say("One or more roles are positioned higher than the bot's highest role.")
                    .await?;
                return Ok(());
            }
        }
    }

    ctx.data()
        .dbs
        .topup
        .transaction(|db| {
            let settings = db.settings.entry(guild_id).or_default();
            if let Some(role) = customer_role {
                settings.customer_role = Some(role.id.get());
            }
            if let Some(role) = upgrade_role {
                settings.upgrade_role = Some(role.id.get());
            }
            if let Some(role) = top1_role {
                settings.top1_role = Some(role.id.get());
            }
            if let Some(role) = top5_role {
                settings.top5_role = Some(role.id.get());
            }
            if let Some(amount) = amount_threshold {
                settings.amount_threshold = amount;
            }
            if let Some(count) = count_threshold {
                settings.count_threshold = count;
            }
            Ok(())
        })
        .await?;

    refresh_rank_roles(ctx.serenity_context(), guild_id, &ctx.data().dbs.topup).await;
    ctx.say("✅ Top-up rewards updated!").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_total;

    #[test]
    fn blank_fields_keep_current_values() {
        assert_eq!(parse_total(None), Ok(None));
        assert_eq!(parse_total(Some("".into())), Ok(None));
        assert_eq!(parse_total(Some("   ".into())), Ok(None));
    }

    #[test]
    fn numbers_are_parsed_after_trimming() {
        assert_eq!(parse_total(Some(" 250 ".into())), Ok(Some(250)));
        assert!(parse_total(Some("2.5".into())).is_err());
        assert!(parse_total(Some("lots".into())).is_err());
    }
}
