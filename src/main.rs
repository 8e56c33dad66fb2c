use anyhow::Result;
use clap::Parser;
use robyul::{
    config::Config,
    context::Context,
    discord::SerenityDiscord,
    dispatch::Dispatcher,
    handler::Handler,
    log_internal, logging,
    plugin::plugins,
    registry::Registry,
    store::{FileStore, MemoryStore, Store},
    supervisor::spawn_supervised,
};
use serenity::{
    all::{GatewayIntents, Http},
    Client,
};
use std::{path::PathBuf, sync::Arc, time::Duration};

#[derive(Parser)]
#[command(name = "robyul")]
#[command(about = "A modular Discord bot", long_about = None)]
struct Cli {
    /// Config file path.  Defaults to ~/.config/robyul/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let cfg = Config::load(cli.config.as_deref()).await?;
    let token = cfg.general.discord_token.clone();
    let backoff = Duration::from_secs(cfg.background.restart_backoff_secs);

    let store: Arc<dyn Store> = match &cfg.storage.path {
        Some(path) => Arc::new(FileStore::open(path.clone()).await?),
        None => {
            tracing::warn!("No storage path configured, nothing will survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let http = Arc::new(Http::new(&token));
    let discord = Arc::new(SerenityDiscord::new(http).await?);
    let registry = Arc::new(Registry::new(plugins()));
    let ctx = Context::new(cfg, discord, store, registry.clone());

    registry.init_all(&ctx).await?;
    registry.activate().await?;

    let ratelimits = ctx.ratelimits.clone();
    spawn_supervised("ratelimit-refiller", backoff, move || {
        let ratelimits = ratelimits.clone();
        async move { ratelimits.run_refiller().await }
    });

    // Things we want discord to tell us about.
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MODERATION
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::DIRECT_MESSAGE_REACTIONS
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&token, intents)
        .event_handler(Handler::new(Dispatcher::new(ctx.clone())))
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Could not listen for Ctrl-C: {}", e);
            return;
        }
        log_internal!("Shutting down");
        shard_manager.shutdown_all().await;
    });

    let result = client.start().await;
    registry.uninit_all(&ctx).await;
    result.map_err(Into::into)
}
