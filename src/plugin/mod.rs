pub use crate::context::Context;
pub use crate::event::{
    BanEvent, IncomingMessage, MemberEvent, MessageDeleteEvent, ReactionEvent,
};
use anyhow::Result;
use bitflags::bitflags;
use std::sync::Arc;

mod autoroles;
mod choice;
mod config;
mod customcommands;
mod debug;
mod dog;
mod eightball;
mod eventlog;
mod help;
mod isup;
mod modules;
mod ping;
mod reactionpolls;
mod reload;
mod reminders;
mod rps;
mod uptime;

bitflags! {
    /// Optional callbacks a plugin implements.  The dispatcher only calls what is declared here.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Callbacks: u16 {
        const READY = 1 << 0;
        const MESSAGE = 1 << 1;
        const MESSAGE_DELETE = 1 << 2;
        const REACTION_ADD = 1 << 3;
        const REACTION_REMOVE = 1 << 4;
        const GUILD_MEMBER_ADD = 1 << 5;
        const GUILD_MEMBER_REMOVE = 1 << 6;
        const GUILD_BAN_ADD = 1 << 7;
        const GUILD_BAN_REMOVE = 1 << 8;
    }
}

/// A message which matched one of a plugin's commands
#[derive(Clone, Debug)]
pub struct Invocation {
    /// The keyword that matched, without prefix
    pub command: String,
    /// Everything after the keyword, trimmed
    pub args: String,
    pub msg: IncomingMessage,
}

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  Used in logs
    fn name(&self) -> &'static str;

    /// Keywords routed to `action`.  Case-sensitive.
    fn commands(&self) -> &'static [&'static str] {
        &[]
    }

    /// Help message line.  None if no help message
    fn usage(&self, _prefix: &str) -> Option<String> {
        None
    }

    fn callbacks(&self) -> Callbacks {
        Callbacks::empty()
    }

    /// Initialize state information.  Called once, before any event is dispatched.
    async fn init(&self, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    /// Release whatever `init` set up
    async fn uninit(&self, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    /// Run one of `commands`.  Errors are answered at the dispatch boundary.
    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()>;

    async fn on_ready(&self, _ctx: &Context, _guild_count: usize) -> Result<()> {
        Ok(())
    }

    async fn on_message(&self, _ctx: &Context, _msg: &IncomingMessage) -> Result<()> {
        Ok(())
    }

    async fn on_message_delete(&self, _ctx: &Context, _event: &MessageDeleteEvent) -> Result<()> {
        Ok(())
    }

    async fn on_reaction_add(&self, _ctx: &Context, _event: &ReactionEvent) -> Result<()> {
        Ok(())
    }

    async fn on_reaction_remove(&self, _ctx: &Context, _event: &ReactionEvent) -> Result<()> {
        Ok(())
    }

    async fn on_guild_member_add(&self, _ctx: &Context, _event: &MemberEvent) -> Result<()> {
        Ok(())
    }

    async fn on_guild_member_remove(&self, _ctx: &Context, _event: &MemberEvent) -> Result<()> {
        Ok(())
    }

    async fn on_guild_ban_add(&self, _ctx: &Context, _event: &BanEvent) -> Result<()> {
        Ok(())
    }

    async fn on_guild_ban_remove(&self, _ctx: &Context, _event: &BanEvent) -> Result<()> {
        Ok(())
    }
}

/// Ordered list of available plugins.  Earlier plugins win command keyword collisions.
pub fn plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        // Core bot operations
        Arc::new(debug::PluginDebug),
        Arc::new(help::PluginHelp),
        Arc::new(config::PluginConfig),
        Arc::new(modules::PluginModules),
        Arc::new(uptime::PluginUptime),
        Arc::new(reload::PluginReload),
        Arc::new(ping::PluginPing),
        // Random stuff
        Arc::new(choice::PluginChoice),
        Arc::new(eightball::PluginEightBall),
        Arc::new(rps::PluginRps),
        Arc::new(dog::PluginDog),
        Arc::new(isup::PluginIsUp::new()),
        // Stateful features
        Arc::new(reminders::PluginReminders::new()),
        Arc::new(customcommands::PluginCustomCommands::new()),
        Arc::new(reactionpolls::PluginReactionPolls::new()),
        // Moderation
        Arc::new(autoroles::PluginAutoRoles::new()),
        Arc::new(eventlog::PluginEventLog),
    ]
}
