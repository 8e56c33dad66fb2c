//! Command routing and event fan-out.
//!
//! Every plugin callback and every command action runs on its own tokio task inside a second,
//! outer task.  The outer task is the recovery point: it sees the inner task's result or panic,
//! logs it and, for commands, tells the user.  A failing plugin therefore never takes the gateway
//! handler or its sibling plugins down with it.

use crate::{
    context::Context,
    error::CommandError,
    event::{Event, IncomingMessage},
    helper::split_command,
    i18n::{get_text, get_text_f},
    log_event,
    permissions::is_bot_admin,
    plugin::{Callbacks, Invocation, Plugin},
    ratelimit::CHILL,
};
use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct Dispatcher {
    ctx: Context,
}

/// Callback a plugin needs to declare to receive `event`
fn callback_of(event: &Event) -> Callbacks {
    match event {
        Event::Ready { .. } => Callbacks::READY,
        Event::Message(_) => Callbacks::MESSAGE,
        Event::MessageDelete(_) => Callbacks::MESSAGE_DELETE,
        Event::ReactionAdd(_) => Callbacks::REACTION_ADD,
        Event::ReactionRemove(_) => Callbacks::REACTION_REMOVE,
        Event::GuildMemberAdd(_) => Callbacks::GUILD_MEMBER_ADD,
        Event::GuildMemberRemove(_) => Callbacks::GUILD_MEMBER_REMOVE,
        Event::GuildBanAdd(_) => Callbacks::GUILD_BAN_ADD,
        Event::GuildBanRemove(_) => Callbacks::GUILD_BAN_REMOVE,
    }
}

async fn run_callback(plugin: &dyn Plugin, ctx: &Context, event: &Event) -> Result<()> {
    match event {
        Event::Ready { guild_count } => plugin.on_ready(ctx, *guild_count).await,
        Event::Message(msg) => plugin.on_message(ctx, msg).await,
        Event::MessageDelete(e) => plugin.on_message_delete(ctx, e).await,
        Event::ReactionAdd(e) => plugin.on_reaction_add(ctx, e).await,
        Event::ReactionRemove(e) => plugin.on_reaction_remove(ctx, e).await,
        Event::GuildMemberAdd(e) => plugin.on_guild_member_add(ctx, e).await,
        Event::GuildMemberRemove(e) => plugin.on_guild_member_remove(ctx, e).await,
        Event::GuildBanAdd(e) => plugin.on_guild_ban_add(ctx, e).await,
        Event::GuildBanRemove(e) => plugin.on_guild_ban_remove(ctx, e).await,
    }
}

impl Dispatcher {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Hand `event` to every interested plugin.  Returns the spawned tasks, which callers are
    /// free to ignore.
    pub async fn dispatch(&self, event: Event) -> Vec<JoinHandle<()>> {
        if !self.ctx.registry.is_active().await {
            tracing::debug!("Dropping {} event, plugins are not active", event.kind());
            return Vec::new();
        }

        let me = self.ctx.discord.current_user_id();
        match event {
            Event::Message(msg) => self.route_message(msg).await,
            // Our own reactions are bookkeeping, e.g. seeding a poll.
            Event::ReactionAdd(ref e) | Event::ReactionRemove(ref e) if e.user_id == Some(me) => {
                Vec::new()
            }
            event => self.fan_out(event),
        }
    }

    fn fan_out(&self, event: Event) -> Vec<JoinHandle<()>> {
        let callback = callback_of(&event);
        let event = Arc::new(event);
        self.ctx
            .registry
            .with_callback(callback)
            .map(|plugin| self.spawn_callback(plugin.clone(), event.clone()))
            .collect()
    }

    fn spawn_callback(&self, plugin: Arc<dyn Plugin>, event: Arc<Event>) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        let name = plugin.name();
        let kind = event.kind();
        tokio::spawn(async move {
            let inner =
                tokio::spawn(async move { run_callback(plugin.as_ref(), &ctx, &event).await });
            match inner.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(plugin = name, callback = kind, "Callback failed: {:#}", e);
                }
                Err(e) if e.is_panic() => {
                    tracing::error!(plugin = name, callback = kind, "Callback panicked");
                }
                Err(_) => {}
            }
        })
    }

    async fn route_message(&self, msg: IncomingMessage) -> Vec<JoinHandle<()>> {
        if msg.author.bot || msg.author.id == self.ctx.discord.current_user_id() {
            return Vec::new();
        }
        let Some(guild_id) = msg.guild_id else {
            return Vec::new();
        };

        let mut handles = self.fan_out(Event::Message(msg.clone()));

        let prefix = match self.ctx.settings.prefix(guild_id).await {
            Ok(prefix) => prefix,
            Err(e) => {
                tracing::error!("Could not get prefix of guild {}: {:#}", guild_id, e);
                return handles;
            }
        };
        let Some((keyword, args)) = split_command(&msg.content, &prefix) else {
            return handles;
        };
        let Some(plugin) = self.ctx.registry.lookup(keyword) else {
            return handles;
        };

        if !self.admit(&msg).await {
            return handles;
        }

        log_event!("{} ran {} in guild {}", msg.author.name, keyword, guild_id);
        let inv = Invocation {
            command: keyword.to_owned(),
            args: args.to_owned(),
            msg,
        };
        handles.push(self.spawn_action(plugin.clone(), inv));
        handles
    }

    /// Charge the author one key.  Tells them off, once, when they are out of keys.
    async fn admit(&self, msg: &IncomingMessage) -> bool {
        let ratelimits = &self.ctx.ratelimits;
        let author = msg.author.id;

        if !ratelimits.has_keys(author).await && !is_bot_admin(&self.ctx, author).await {
            if ratelimits.get(author).await != Some(CHILL) {
                let text = get_text_f("bot.ratelimit.hit", &[&author]);
                if let Err(e) = self.ctx.reply(msg, &text).await {
                    tracing::error!("Could not send ratelimit notice: {:#}", e);
                }
            }
            ratelimits.set(author, CHILL).await;
            return false;
        }

        ratelimits.drain(1, author).await;
        true
    }

    fn spawn_action(&self, plugin: Arc<dyn Plugin>, inv: Invocation) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        let name = plugin.name();
        tokio::spawn(async move {
            let inner = {
                let ctx = ctx.clone();
                let inv = inv.clone();
                tokio::spawn(async move { plugin.action(&ctx, &inv).await })
            };

            let reply = match inner.await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => match e.downcast_ref::<CommandError>() {
                    Some(err) => err.reply(),
                    None => {
                        tracing::error!(
                            plugin = name,
                            command = inv.command.as_str(),
                            "Command failed: {:#}",
                            e
                        );
                        get_text("bot.errors.generic")
                    }
                },
                Err(e) if e.is_panic() => {
                    tracing::error!(
                        plugin = name,
                        command = inv.command.as_str(),
                        "Command panicked"
                    );
                    get_text("bot.errors.generic")
                }
                Err(_) => return,
            };

            if let Err(e) = ctx.reply(&inv.msg, &reply).await {
                tracing::error!(plugin = name, "Could not report command failure: {:#}", e);
            }
        })
    }
}
