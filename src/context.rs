use crate::{
    config::Config, discord::Discord, event::IncomingMessage, ratelimit::BucketContainer,
    registry::Registry, settings::GuildSettingsCache, store::Store,
};
use anyhow::Result;
use serenity::all::{GuildId, MessageId};
use std::{sync::Arc, time::Instant};
use tokio::sync::RwLock;

/// Collection of data that is shared across events.
///
/// Cloning is cheap, every invocation gets its own copy to move onto its task.
#[derive(Clone)]
pub struct Context {
    pub cfg: Arc<RwLock<Config>>,
    pub discord: Arc<dyn Discord>,
    pub store: Arc<dyn Store>,
    pub settings: Arc<GuildSettingsCache>,
    pub ratelimits: Arc<BucketContainer>,
    pub registry: Arc<Registry>,
    pub started_at: Instant,
}

impl Context {
    pub fn new(
        cfg: Config,
        discord: Arc<dyn Discord>,
        store: Arc<dyn Store>,
        registry: Arc<Registry>,
    ) -> Self {
        let settings = Arc::new(GuildSettingsCache::new(
            store.clone(),
            cfg.general.default_prefix.clone(),
        ));
        let ratelimits = Arc::new(BucketContainer::new(cfg.ratelimit.clone()));
        Self {
            cfg: Arc::new(RwLock::new(cfg)),
            discord,
            store,
            settings,
            ratelimits,
            registry,
            started_at: Instant::now(),
        }
    }

    /// Answer in the channel `msg` came from
    pub async fn reply(&self, msg: &IncomingMessage, content: &str) -> Result<MessageId> {
        self.discord.send_message(msg.channel_id, content).await
    }

    /// Command prefix of `guild_id`, falling back to the configured default for DMs
    pub async fn prefix(&self, guild_id: Option<GuildId>) -> Result<String> {
        match guild_id {
            Some(guild_id) => self.settings.prefix(guild_id).await,
            None => Ok(self.cfg.read().await.general.default_prefix.clone()),
        }
    }
}
