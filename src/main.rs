use databases::Databases;
use modules::{
    credit::{credit, handler::CreditHandler},
    orders::order,
    relay::{commands::dm, message},
    shop::status,
    system::{events::ReadyHandler, task::PresenceTask},
    topup::topup,
    voice::{
        commands::{join, leave},
        handler::VoiceDriftHandler,
        keeper::{KeeperConfig, VoiceKeeper},
        task::KeeperHeartbeatTask,
    },
};
use poise::serenity_prelude::{self as serenity, CreateAllowedMentions};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tasks::TaskManager;
use tracing::{error, info, trace};

mod database;
mod databases;
mod events;
mod modules;
mod server;
mod tasks;
mod utils;

use crate::events::EventManager;

#[derive(Clone)]
pub struct Data {
    pub dbs: Arc<Databases>,
    pub task_manager: Arc<TaskManager>,
    pub event_manager: Arc<EventManager>,
    pub keeper: Arc<VoiceKeeper>,
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data").finish_non_exhaustive()
    }
}

impl Data {
    pub async fn init_tasks(&self, ctx: &serenity::Context) {
        self.task_manager
            .add_task(KeeperHeartbeatTask::new(self.keeper.clone()))
            .await;
        self.task_manager.add_task(PresenceTask::new()).await;

        self.task_manager.start_tasks(ctx.clone()).await;
    }
}

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    info!("starting shopkeeper");

    let token = std::env::var("DISCORD_TOKEN").expect("missing DISCORD_TOKEN");
    let intents = serenity::GatewayIntents::non_privileged();
    let manager = Songbird::serenity();

    let keeper_manager = manager.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions::<Data, Error> {
            allowed_mentions: Some(CreateAllowedMentions::new().empty_roles().empty_users()),
            commands: vec![
                register(),
                join(),
                leave(),
                credit(),
                topup(),
                status(),
                message(),
                dm(),
                order(),
            ],
            pre_command: |ctx| {
                Box::pin(async move {
                    trace!(
                        "Command {} used by {} in {}",
                        ctx.command().qualified_name,
                        ctx.author().tag(),
                        ctx.guild_id()
                            .map_or_else(|| "DM".to_string(), |id| id.to_string())
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command {} completed for {} in {}",
                        ctx.command().qualified_name,
                        ctx.author().tag(),
                        ctx.guild_id()
                            .map_or_else(|| "DM".to_string(), |id| id.to_string())
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!(
                                "Command {} failed for {} in {}: {:?}",
                                ctx.command().qualified_name,
                                ctx.author().tag(),
                                ctx.guild_id()
                                    .map_or_else(|| "DM".to_string(), |id| id.to_string()),
                                error
                            );
                        }
                        err => error!("Other framework error: {:?}", err),
                    }
                })
            },
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    data.event_manager.handle_event(ctx, event).await;
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                let commands = &framework.options().commands;
                match std::env::var("GUILD_ID")
                    .ok()
                    .and_then(|raw| raw.parse::<u64>().ok())
                {
                    Some(guild) => {
                        info!("registering commands in guild {}", guild);
                        poise::builtins::register_in_guild(
                            ctx,
                            commands,
                            serenity::GuildId::new(guild),
                        )
                        .await?;
                    }
                    None => {
                        info!("registering commands globally");
                        poise::builtins::register_globally(ctx, commands).await?;
                    }
                }

                let dbs = Arc::new(Databases::default().await?);
                let task_manager = Arc::new(tasks::TaskManager::new());
                let event_manager = Arc::new(events::EventManager::new());

                let keeper = Arc::new(VoiceKeeper::new(
                    dbs.keeper.clone(),
                    keeper_manager,
                    KeeperConfig::default(),
                ));

                event_manager.add_handler(ReadyHandler).await;
                event_manager
                    .add_handler(VoiceDriftHandler::new(keeper.clone()))
                    .await;
                event_manager
                    .add_handler(CreditHandler::new(dbs.credit.clone()))
                    .await;

                let data = Data {
                    dbs,
                    task_manager,
                    event_manager,
                    keeper: keeper.clone(),
                };

                keeper.boot(ctx).await;
                data.init_tasks(ctx).await;

                Ok(data)
            })
        })
        .build();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(8080);
    server::spawn(port);

    let client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .register_songbird_with(manager)
        .await;

    client.unwrap().start().await.unwrap();
}
