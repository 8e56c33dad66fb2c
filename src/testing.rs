//! Fakes and fixtures for unit tests

use crate::{
    config::{Config, General},
    context::Context,
    discord::{Discord, Embed, MemberInfo, ReactionCount},
    event::{Author, IncomingMessage},
    plugin::{Callbacks, Invocation, Plugin},
    registry::Registry,
    store::MemoryStore,
};
use anyhow::{anyhow, Result};
use serenity::all::{ChannelId, GuildId, MessageId, RoleId, UserId};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

pub const GUILD: GuildId = GuildId::new(100);
pub const CHANNEL: ChannelId = ChannelId::new(200);
pub const USER: UserId = UserId::new(300);
/// The bot itself
pub const BOT_USER: UserId = UserId::new(999);
pub const BOT_ADMIN: UserId = UserId::new(1000);
pub const BOT_MODERATOR: UserId = UserId::new(1001);

static NEXT_ID: AtomicU64 = AtomicU64::new(10_000);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Everything the bot did through `MockDiscord`, in order
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    Message {
        channel_id: ChannelId,
        message_id: MessageId,
        content: String,
    },
    Embed {
        channel_id: ChannelId,
        message_id: MessageId,
        embed: Embed,
    },
    Edit {
        message_id: MessageId,
        content: String,
    },
    EditEmbed {
        message_id: MessageId,
        embed: Embed,
    },
    DirectMessage {
        user_id: UserId,
        content: String,
    },
    ReactionAdd {
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: String,
    },
    ReactionRemove {
        message_id: MessageId,
        emoji: String,
        user_id: UserId,
    },
    RoleAdd {
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    },
}

/// Records outbound operations instead of performing them
#[derive(Default)]
pub struct MockDiscord {
    outbound: Mutex<Vec<Outbound>>,
    typing: AtomicUsize,
    members: Mutex<HashMap<(GuildId, UserId), MemberInfo>>,
    reactions: Mutex<HashMap<(MessageId, String), Vec<UserId>>>,
}

impl MockDiscord {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, outbound: Outbound) {
        self.outbound.lock().unwrap().push(outbound);
    }

    pub fn outbound(&self) -> Vec<Outbound> {
        self.outbound.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.outbound.lock().unwrap().clear();
    }

    /// Contents of plain channel messages
    pub fn sent_texts(&self) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Message { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn sent_embeds(&self) -> Vec<Embed> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Embed { embed, .. } => Some(embed),
                _ => None,
            })
            .collect()
    }

    pub fn edited_embeds(&self) -> Vec<(MessageId, Embed)> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::EditEmbed { message_id, embed } => Some((message_id, embed)),
                _ => None,
            })
            .collect()
    }

    pub fn direct_messages(&self) -> Vec<(UserId, String)> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::DirectMessage { user_id, content } => Some((user_id, content)),
                _ => None,
            })
            .collect()
    }

    pub fn reactions_added(&self) -> Vec<(ChannelId, MessageId, String)> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::ReactionAdd {
                    channel_id,
                    message_id,
                    emoji,
                } => Some((channel_id, message_id, emoji)),
                _ => None,
            })
            .collect()
    }

    pub fn reactions_removed(&self) -> Vec<(MessageId, String, UserId)> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::ReactionRemove {
                    message_id,
                    emoji,
                    user_id,
                } => Some((message_id, emoji, user_id)),
                _ => None,
            })
            .collect()
    }

    pub fn roles_added(&self) -> Vec<(GuildId, UserId, RoleId)> {
        self.outbound()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::RoleAdd {
                    guild_id,
                    user_id,
                    role_id,
                } => Some((guild_id, user_id, role_id)),
                _ => None,
            })
            .collect()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }

    pub fn set_member(&self, guild_id: GuildId, member: MemberInfo) {
        self.members
            .lock()
            .unwrap()
            .insert((guild_id, member.user_id), member);
    }

    /// Pretend `users` reacted with `emoji` on `message_id`
    pub fn set_reaction_users(&self, message_id: MessageId, emoji: &str, users: Vec<UserId>) {
        self.reactions
            .lock()
            .unwrap()
            .insert((message_id, emoji.to_owned()), users);
    }
}

#[serenity::async_trait]
impl Discord for MockDiscord {
    fn current_user_id(&self) -> UserId {
        BOT_USER
    }

    async fn send_message(&self, channel_id: ChannelId, content: &str) -> Result<MessageId> {
        let message_id = MessageId::new(next_id());
        self.record(Outbound::Message {
            channel_id,
            message_id,
            content: content.to_owned(),
        });
        Ok(message_id)
    }

    async fn send_embed(&self, channel_id: ChannelId, embed: &Embed) -> Result<MessageId> {
        let message_id = MessageId::new(next_id());
        self.record(Outbound::Embed {
            channel_id,
            message_id,
            embed: embed.clone(),
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> Result<()> {
        self.record(Outbound::Edit {
            message_id,
            content: content.to_owned(),
        });
        Ok(())
    }

    async fn edit_embed(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
        embed: &Embed,
    ) -> Result<()> {
        self.record(Outbound::EditEmbed {
            message_id,
            embed: embed.clone(),
        });
        Ok(())
    }

    async fn send_direct_message(&self, user_id: UserId, content: &str) -> Result<MessageId> {
        self.record(Outbound::DirectMessage {
            user_id,
            content: content.to_owned(),
        });
        Ok(MessageId::new(next_id()))
    }

    async fn broadcast_typing(&self, _channel_id: ChannelId) -> Result<()> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<()> {
        self.record(Outbound::ReactionAdd {
            channel_id,
            message_id,
            emoji: emoji.to_owned(),
        });
        self.reactions
            .lock()
            .unwrap()
            .entry((message_id, emoji.to_owned()))
            .or_default()
            .push(BOT_USER);
        Ok(())
    }

    async fn remove_reaction(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
        user_id: UserId,
    ) -> Result<()> {
        self.record(Outbound::ReactionRemove {
            message_id,
            emoji: emoji.to_owned(),
            user_id,
        });
        if let Some(users) = self
            .reactions
            .lock()
            .unwrap()
            .get_mut(&(message_id, emoji.to_owned()))
        {
            users.retain(|u| *u != user_id);
        }
        Ok(())
    }

    async fn reaction_counts(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Vec<ReactionCount>> {
        let reactions = self.reactions.lock().unwrap();
        let mut counts: Vec<ReactionCount> = reactions
            .iter()
            .filter(|((id, _), users)| *id == message_id && !users.is_empty())
            .map(|((_, emoji), users)| ReactionCount {
                emoji: emoji.clone(),
                count: users.len() as u64,
            })
            .collect();
        counts.sort_by(|a, b| a.emoji.cmp(&b.emoji));
        Ok(counts)
    }

    async fn reaction_users(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<Vec<UserId>> {
        Ok(self
            .reactions
            .lock()
            .unwrap()
            .get(&(message_id, emoji.to_owned()))
            .cloned()
            .unwrap_or_default())
    }

    async fn user_name(&self, user_id: UserId) -> Result<String> {
        Ok(format!("user{}", user_id))
    }

    async fn member(&self, guild_id: GuildId, user_id: UserId) -> Result<MemberInfo> {
        self.members
            .lock()
            .unwrap()
            .get(&(guild_id, user_id))
            .cloned()
            .ok_or_else(|| anyhow!("Unknown member {} of guild {}", user_id, guild_id))
    }

    async fn add_member_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<()> {
        self.record(Outbound::RoleAdd {
            guild_id,
            user_id,
            role_id,
        });
        Ok(())
    }
}

pub fn config() -> Config {
    Config {
        general: General {
            discord_token: "test-token".to_owned(),
            bot_owners: vec![BOT_ADMIN],
            bot_moderators: vec![BOT_MODERATOR],
            default_prefix: "!".to_owned(),
        },
        storage: Default::default(),
        ratelimit: Default::default(),
        background: Default::default(),
        reminders: Default::default(),
        source: None,
    }
}

/// Context over a fresh in-memory store and an uninitialized registry of the real plugins
pub async fn context(discord: Arc<MockDiscord>) -> Context {
    context_with_registry(discord, Arc::new(Registry::new(crate::plugin::plugins()))).await
}

pub async fn context_with_registry(discord: Arc<MockDiscord>, registry: Arc<Registry>) -> Context {
    Context::new(config(), discord, Arc::new(MemoryStore::new()), registry)
}

/// A guild message from `USER` in `CHANNEL`
pub fn message(content: &str) -> IncomingMessage {
    message_from(USER, content)
}

pub fn message_from(author: UserId, content: &str) -> IncomingMessage {
    IncomingMessage {
        id: MessageId::new(next_id()),
        channel_id: CHANNEL,
        guild_id: Some(GUILD),
        author: Author {
            id: author,
            name: format!("user{}", author),
            bot: false,
        },
        content: content.to_owned(),
        mentions: Vec::new(),
    }
}

pub fn invocation(command: &str, args: &str) -> Invocation {
    invocation_from(USER, command, args)
}

pub fn invocation_from(author: UserId, command: &str, args: &str) -> Invocation {
    Invocation {
        command: command.to_owned(),
        args: args.to_owned(),
        msg: message_from(author, &format!("!{} {}", command, args)),
    }
}

type Failure = Box<dyn Fn(&str) -> anyhow::Error + Send + Sync>;

/// Plugin which records what it was asked to do
pub struct Recorder {
    name: &'static str,
    commands: &'static [&'static str],
    callbacks: Callbacks,
    fail_init: bool,
    panic: bool,
    failure: Option<Failure>,
    init: AtomicUsize,
    uninit: AtomicUsize,
    actions: Mutex<Vec<Invocation>>,
    events: Mutex<Vec<&'static str>>,
}

impl Recorder {
    /// Subscribed to every callback
    pub fn new(name: &'static str, commands: &'static [&'static str]) -> Self {
        Self {
            name,
            commands,
            callbacks: Callbacks::all(),
            fail_init: false,
            panic: false,
            failure: None,
            init: AtomicUsize::new(0),
            uninit: AtomicUsize::new(0),
            actions: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Panic in every action and callback
    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    /// Fail every action with the error `f` builds from the command
    pub fn failing_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Error + Send + Sync + 'static,
    {
        self.failure = Some(Box::new(f));
        self
    }

    pub fn init_count(&self) -> usize {
        self.init.load(Ordering::SeqCst)
    }

    pub fn uninit_count(&self) -> usize {
        self.uninit.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> Vec<Invocation> {
        self.actions.lock().unwrap().clone()
    }

    /// Kinds of the events delivered to callbacks
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    fn observe(&self, kind: &'static str) -> Result<()> {
        if self.panic {
            panic!("{} panics on {}", self.name, kind);
        }
        self.events.lock().unwrap().push(kind);
        Ok(())
    }
}

#[serenity::async_trait]
impl Plugin for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn commands(&self) -> &'static [&'static str] {
        self.commands
    }

    fn callbacks(&self) -> Callbacks {
        self.callbacks
    }

    async fn init(&self, _ctx: &Context) -> Result<()> {
        if self.fail_init {
            anyhow::bail!("{} refuses to start", self.name);
        }
        self.init.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn uninit(&self, _ctx: &Context) -> Result<()> {
        self.uninit.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn action(&self, _ctx: &Context, inv: &Invocation) -> Result<()> {
        if self.panic {
            panic!("{} panics on {}", self.name, inv.command);
        }
        if let Some(failure) = &self.failure {
            return Err(failure(&inv.command));
        }
        self.actions.lock().unwrap().push(inv.clone());
        Ok(())
    }

    async fn on_ready(&self, _ctx: &Context, _guild_count: usize) -> Result<()> {
        self.observe("ready")
    }

    async fn on_message(&self, _ctx: &Context, _msg: &IncomingMessage) -> Result<()> {
        self.observe("message")
    }

    async fn on_message_delete(
        &self,
        _ctx: &Context,
        _event: &crate::event::MessageDeleteEvent,
    ) -> Result<()> {
        self.observe("message_delete")
    }

    async fn on_reaction_add(
        &self,
        _ctx: &Context,
        _event: &crate::event::ReactionEvent,
    ) -> Result<()> {
        self.observe("reaction_add")
    }

    async fn on_reaction_remove(
        &self,
        _ctx: &Context,
        _event: &crate::event::ReactionEvent,
    ) -> Result<()> {
        self.observe("reaction_remove")
    }

    async fn on_guild_member_add(
        &self,
        _ctx: &Context,
        _event: &crate::event::MemberEvent,
    ) -> Result<()> {
        self.observe("guild_member_add")
    }

    async fn on_guild_member_remove(
        &self,
        _ctx: &Context,
        _event: &crate::event::MemberEvent,
    ) -> Result<()> {
        self.observe("guild_member_remove")
    }

    async fn on_guild_ban_add(
        &self,
        _ctx: &Context,
        _event: &crate::event::BanEvent,
    ) -> Result<()> {
        self.observe("guild_ban_add")
    }

    async fn on_guild_ban_remove(
        &self,
        _ctx: &Context,
        _event: &crate::event::BanEvent,
    ) -> Result<()> {
        self.observe("guild_ban_remove")
    }
}
