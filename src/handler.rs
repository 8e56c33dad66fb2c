use crate::{
    dispatch::Dispatcher,
    event::{
        Author, BanEvent, Event, IncomingMessage, MemberEvent, MessageDeleteEvent, ReactionEvent,
    },
};
use serenity::all::{ChannelId, GuildId, Member, Message, MessageId, Reaction, Ready, User};

/// Discord event handler.  Translates serenity's callbacks into `Event`s for the dispatcher.
pub struct Handler {
    dispatcher: Dispatcher,
}

impl Handler {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    async fn dispatch(&self, event: Event) {
        // The dispatcher isolates every plugin on its own task; nothing to wait for here.
        drop(self.dispatcher.dispatch(event).await);
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, _discord_ctx: serenity::all::Context, ready: Ready) {
        self.dispatch(Event::Ready {
            guild_count: ready.guilds.len(),
        })
        .await;
    }

    async fn message(&self, _discord_ctx: serenity::all::Context, msg: Message) {
        self.dispatch(Event::Message(IncomingMessage::from(msg)))
            .await;
    }

    async fn message_delete(
        &self,
        _discord_ctx: serenity::all::Context,
        channel_id: ChannelId,
        message_id: MessageId,
        guild_id: Option<GuildId>,
    ) {
        self.dispatch(Event::MessageDelete(MessageDeleteEvent {
            channel_id,
            message_id,
            guild_id,
        }))
        .await;
    }

    async fn reaction_add(&self, _discord_ctx: serenity::all::Context, reaction: Reaction) {
        self.dispatch(Event::ReactionAdd(ReactionEvent::from(reaction)))
            .await;
    }

    async fn reaction_remove(&self, _discord_ctx: serenity::all::Context, reaction: Reaction) {
        self.dispatch(Event::ReactionRemove(ReactionEvent::from(reaction)))
            .await;
    }

    async fn guild_member_addition(&self, _discord_ctx: serenity::all::Context, member: Member) {
        self.dispatch(Event::GuildMemberAdd(MemberEvent::from(member)))
            .await;
    }

    async fn guild_member_removal(
        &self,
        _discord_ctx: serenity::all::Context,
        guild_id: GuildId,
        user: User,
        _member: Option<Member>,
    ) {
        self.dispatch(Event::GuildMemberRemove(MemberEvent {
            guild_id,
            user: Author::from(&user),
        }))
        .await;
    }

    async fn guild_ban_addition(
        &self,
        _discord_ctx: serenity::all::Context,
        guild_id: GuildId,
        user: User,
    ) {
        self.dispatch(Event::GuildBanAdd(BanEvent {
            guild_id,
            user: Author::from(&user),
        }))
        .await;
    }

    async fn guild_ban_removal(
        &self,
        _discord_ctx: serenity::all::Context,
        guild_id: GuildId,
        user: User,
    ) {
        self.dispatch(Event::GuildBanRemove(BanEvent {
            guild_id,
            user: Author::from(&user),
        }))
        .await;
    }
}
