//! Keeps the bot parked in one voice channel per guild: join commands record
//! the desired channel, and the drift handler plus the heartbeat task funnel
//! every recovery through [`VoiceKeeper::schedule_rejoin`].

use crate::{database::Database, default_struct};
use dashmap::DashMap;
use poise::serenity_prelude::{ChannelId, ChannelType, Context, GuildId};
use songbird::{error::JoinError, Call, Songbird};
use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{sync::Mutex, time};
use tracing::{debug, info};

use super::database::KeeperDatabase;

default_struct! {
#[derive(Debug, Clone, Copy)]
pub struct KeeperConfig {
    /// Minimum wall-clock spacing between rejoin attempts per guild.
    pub rejoin_cooldown: Duration = Duration::from_secs(5),
    /// How long a join attempt may take before it is abandoned.
    pub ready_timeout: Duration = Duration::from_millis(7_500),
    /// Reconciliation interval for the backstop task.
    pub heartbeat_interval: Duration = Duration::from_secs(30 * 60),
}
}

#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("guild {0} is not available")]
    UnknownGuild(u64),
    #[error("channel {0} no longer exists")]
    UnknownChannel(u64),
    #[error("channel {0} is not a voice channel")]
    NotVoice(u64),
    #[error("missing permission to connect to channel {0}")]
    MissingConnect(u64),
    #[error("voice gateway refused the connection: {0}")]
    Join(#[from] JoinError),
    #[error("the connection did not become ready in time")]
    ReadyTimeout,
}

/// Supervisor state for all guilds. One instance per process, shared via
/// `Arc`; the cooldown and connection maps are process-local and start
/// empty after a restart.
pub struct VoiceKeeper {
    db: Database<KeeperDatabase>,
    manager: Arc<Songbird>,
    config: KeeperConfig,
    cooldowns: DashMap<u64, Instant>,
    connections: DashMap<u64, Arc<Mutex<Call>>>,
}

impl VoiceKeeper {
    pub fn new(db: Database<KeeperDatabase>, manager: Arc<Songbird>, config: KeeperConfig) -> Self {
        Self {
            db,
            manager,
            config,
            cooldowns: DashMap::new(),
            connections: DashMap::new(),
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.config.heartbeat_interval
    }

    pub async fn enable(&self, guild_id: u64, channel_id: u64) -> Result<(), String> {
        self.db.enable_keep(guild_id, channel_id).await
    }

    pub async fn disable(&self, guild_id: u64) -> Result<(), String> {
        self.db.disable_keep(guild_id).await
    }

    /// Configured channel for a guild, only while keeping is enabled.
    pub async fn active_target(&self, guild_id: u64) -> Option<u64> {
        self.db
            .keep_config(guild_id)
            .await
            .filter(|config| config.enabled)
            .map(|config| config.channel_id)
    }

    pub async fn enabled_targets(&self) -> Vec<(u64, u64)> {
        self.db.enabled_targets().await
    }

    /// The live call handle: whatever the voice manager tracks, falling back
    /// to the locally cached handle from the last successful join.
    pub fn current_connection(&self, guild_id: u64) -> Option<Arc<Mutex<Call>>> {
        self.manager.get(GuildId::new(guild_id)).or_else(|| {
            self.connections
                .get(&guild_id)
                .map(|entry| entry.value().clone())
        })
    }

    /// Channel the voice manager reports the bot as joined to, if any.
    pub async fn connected_channel(&self, guild_id: u64) -> Option<u64> {
        match self.manager.get(GuildId::new(guild_id)) {
            Some(call) => call.lock().await.current_channel().map(|c| c.0.get()),
            None => None,
        }
    }

    fn can_attempt(&self, guild_id: u64) -> bool {
        match self.cooldowns.get(&guild_id) {
            Some(last) => last.elapsed() >= self.config.rejoin_cooldown,
            None => true,
        }
    }

    fn mark_attempt(&self, guild_id: u64) {
        self.cooldowns.insert(guild_id, Instant::now());
    }

    /// Fire-and-forget rejoin. Attempts inside the cooldown window are
    /// dropped, and a spawned attempt's failure is only observable through
    /// the next heartbeat pass.
    pub fn schedule_rejoin(self: &Arc<Self>, ctx: &Context, guild_id: u64, channel_id: u64) {
        if !self.can_attempt(guild_id) {
            debug!("Dropping rejoin for guild {} (cooldown)", guild_id);
            return;
        }
        self.mark_attempt(guild_id);

        let keeper = Arc::clone(self);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = keeper.join_now(&ctx, guild_id, channel_id).await {
                debug!("Rejoin for guild {} abandoned: {}", guild_id, e);
            }
        });
    }

    /// The full join sequence: resolve the channel, check CONNECT, destroy
    /// any previous connection, then open a new muted/deafened one and wait
    /// for it to come up within the configured timeout.
    pub async fn join_now(
        &self,
        ctx: &Context,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<(), KeeperError> {
        let bot_id = ctx.cache.current_user().id;
        let me = GuildId::new(guild_id)
            .member(&ctx.http, bot_id)
            .await
            .map_err(|_| KeeperError::UnknownGuild(guild_id))?;

        let can_connect = {
            let guild = ctx
                .cache
                .guild(GuildId::new(guild_id))
                .ok_or(KeeperError::UnknownGuild(guild_id))?;
            let channel = guild
                .channels
                .get(&ChannelId::new(channel_id))
                .ok_or(KeeperError::UnknownChannel(channel_id))?;
            if !matches!(channel.kind, ChannelType::Voice | ChannelType::Stage) {
                return Err(KeeperError::NotVoice(channel_id));
            }
            guild.user_permissions_in(channel, &me).connect()
        };
        if !can_connect {
            return Err(KeeperError::MissingConnect(channel_id));
        }

        self.drop_connection(guild_id).await;

        // Mute/deafen before joining so the join payload already carries the
        // silent-presence state.
        let call = self.manager.get_or_insert(GuildId::new(guild_id));
        {
            let mut call = call.lock().await;
            let _ = call.deafen(true).await;
            let _ = call.mute(true).await;
        }

        let join = self
            .manager
            .join_gateway(GuildId::new(guild_id), ChannelId::new(channel_id));
        match time::timeout(self.config.ready_timeout, join).await {
            Ok(Ok((_, call))) => {
                self.connections.insert(guild_id, call);
                info!("Holding voice channel {} in guild {}", channel_id, guild_id);
                Ok(())
            }
            Ok(Err(e)) => Err(KeeperError::Join(e)),
            Err(_) => Err(KeeperError::ReadyTimeout),
        }
    }

    /// Destroys and evicts whatever connection the guild currently holds.
    /// Safe to call when nothing is connected.
    pub async fn drop_connection(&self, guild_id: u64) {
        if let Err(e) = self.manager.remove(GuildId::new(guild_id)).await {
            debug!("No live call to remove for guild {}: {}", guild_id, e);
        }
        self.connections.remove(&guild_id);
    }

    /// Schedules an initial attempt for every enabled guild. Called once per
    /// process, right after login.
    pub async fn boot(self: &Arc<Self>, ctx: &Context) {
        let targets = self.enabled_targets().await;
        info!("Voice keeper booting for {} guild(s)", targets.len());
        for (guild_id, channel_id) in targets {
            self.schedule_rejoin(ctx, guild_id, channel_id);
        }
    }
}

impl fmt::Debug for VoiceKeeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceKeeper")
            .field("config", &self.config)
            .field("tracked_connections", &self.connections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_keeper(dir: &tempfile::TempDir, config: KeeperConfig) -> Arc<VoiceKeeper> {
        let path = dir.path().join("voice_keeper.json");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        Arc::new(VoiceKeeper::new(db, Songbird::serenity(), config))
    }

    #[tokio::test]
    async fn cooldown_gates_repeated_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let config = KeeperConfig {
            rejoin_cooldown: Duration::from_millis(80),
            ..Default::default()
        };
        let keeper = test_keeper(&dir, config).await;

        assert!(keeper.can_attempt(1));
        keeper.mark_attempt(1);
        assert!(!keeper.can_attempt(1));

        // An unrelated guild is not throttled.
        assert!(keeper.can_attempt(2));

        time::sleep(Duration::from_millis(120)).await;
        assert!(keeper.can_attempt(1));
    }

    #[tokio::test]
    async fn drop_connection_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let keeper = test_keeper(&dir, KeeperConfig::default()).await;

        keeper.drop_connection(1).await;
        keeper.drop_connection(1).await;
        assert!(keeper.current_connection(1).is_none());
    }

    #[tokio::test]
    async fn active_target_respects_the_enabled_flag() {
        let dir = tempfile::tempdir().unwrap();
        let keeper = test_keeper(&dir, KeeperConfig::default()).await;

        assert_eq!(keeper.active_target(1).await, None);

        keeper.enable(1, 100).await.unwrap();
        assert_eq!(keeper.active_target(1).await, Some(100));

        keeper.disable(1).await.unwrap();
        assert_eq!(keeper.active_target(1).await, None);
    }

    #[tokio::test]
    async fn no_connection_is_tracked_before_any_join() {
        let dir = tempfile::tempdir().unwrap();
        let keeper = test_keeper(&dir, KeeperConfig::default()).await;

        assert!(keeper.current_connection(5).is_none());
        assert_eq!(keeper.connected_channel(5).await, None);
    }
}
