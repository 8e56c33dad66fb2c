//! The Serenity crate we're using for the Discord API is designed around callbacks to handle
//! events.  However, this does not mesh well with our plugin framework here.  To resolve this,
//! the handler translates the callbacks into a distinct Event enum carrying owned payloads which
//! can be moved onto the task of every plugin that wants them.

use crate::discord::emoji_name;
use serenity::all::{ChannelId, GuildId, Member, MessageId, Reaction, User, UserId};

/// A Discord event
#[derive(Clone, Debug)]
pub enum Event {
    Ready { guild_count: usize },
    Message(IncomingMessage),
    MessageDelete(MessageDeleteEvent),
    ReactionAdd(ReactionEvent),
    ReactionRemove(ReactionEvent),
    GuildMemberAdd(MemberEvent),
    GuildMemberRemove(MemberEvent),
    GuildBanAdd(BanEvent),
    GuildBanRemove(BanEvent),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    pub bot: bool,
}

#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// None for direct messages
    pub guild_id: Option<GuildId>,
    pub author: Author,
    pub content: String,
    pub mentions: Vec<UserId>,
}

#[derive(Clone, Debug)]
pub struct MessageDeleteEvent {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub guild_id: Option<GuildId>,
}

#[derive(Clone, Debug)]
pub struct ReactionEvent {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub guild_id: Option<GuildId>,
    pub user_id: Option<UserId>,
    /// API name, see `discord::emoji_name`
    pub emoji: String,
}

#[derive(Clone, Debug)]
pub struct MemberEvent {
    pub guild_id: GuildId,
    pub user: Author,
}

#[derive(Clone, Debug)]
pub struct BanEvent {
    pub guild_id: GuildId,
    pub user: Author,
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            bot: user.bot,
        }
    }
}

impl From<serenity::all::Message> for IncomingMessage {
    fn from(msg: serenity::all::Message) -> Self {
        Self {
            id: msg.id,
            channel_id: msg.channel_id,
            guild_id: msg.guild_id,
            author: Author::from(&msg.author),
            mentions: msg.mentions.iter().map(|u| u.id).collect(),
            content: msg.content,
        }
    }
}

impl From<Reaction> for ReactionEvent {
    fn from(reaction: Reaction) -> Self {
        Self {
            channel_id: reaction.channel_id,
            message_id: reaction.message_id,
            guild_id: reaction.guild_id,
            user_id: reaction.user_id,
            emoji: emoji_name(&reaction.emoji),
        }
    }
}

impl From<Member> for MemberEvent {
    fn from(member: Member) -> Self {
        Self {
            guild_id: member.guild_id,
            user: Author::from(&member.user),
        }
    }
}

impl IncomingMessage {
    /// Content after a leading mention of `user_id`, trimmed
    pub fn strip_leading_mention(&self, user_id: UserId) -> Option<&str> {
        let plain = format!("<@{}>", user_id);
        let nick = format!("<@!{}>", user_id);
        self.content
            .strip_prefix(&plain)
            .or_else(|| self.content.strip_prefix(&nick))
            .map(str::trim)
    }
}

impl Event {
    /// Name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Ready { .. } => "ready",
            Event::Message(_) => "message",
            Event::MessageDelete(_) => "message_delete",
            Event::ReactionAdd(_) => "reaction_add",
            Event::ReactionRemove(_) => "reaction_remove",
            Event::GuildMemberAdd(_) => "guild_member_add",
            Event::GuildMemberRemove(_) => "guild_member_remove",
            Event::GuildBanAdd(_) => "guild_ban_add",
            Event::GuildBanRemove(_) => "guild_ban_remove",
        }
    }
}
