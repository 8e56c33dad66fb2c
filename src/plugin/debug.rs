use crate::{log_event, plugin::*};
use anyhow::Result;

/// Logs every event it sees
pub struct PluginDebug;

#[serenity::async_trait]
impl Plugin for PluginDebug {
    fn name(&self) -> &'static str {
        "debug"
    }

    fn callbacks(&self) -> Callbacks {
        Callbacks::all()
    }

    async fn action(&self, _ctx: &Context, _inv: &Invocation) -> Result<()> {
        Ok(())
    }

    async fn on_ready(&self, ctx: &Context, guild_count: usize) -> Result<()> {
        log_event!(
            "Connected to {} server(s) as {}",
            guild_count,
            ctx.discord.current_user_id()
        );
        Ok(())
    }

    async fn on_message(&self, _ctx: &Context, msg: &IncomingMessage) -> Result<()> {
        match msg.guild_id {
            Some(guild_id) => log_event!(
                "{}/{} {}: {}",
                guild_id,
                msg.channel_id,
                msg.author.name,
                msg.content
            ),
            None => log_event!("DM {}: {}", msg.author.name, msg.content),
        }
        Ok(())
    }

    async fn on_message_delete(&self, _ctx: &Context, event: &MessageDeleteEvent) -> Result<()> {
        log_event!(
            "Message {} deleted in channel {}",
            event.message_id,
            event.channel_id
        );
        Ok(())
    }

    async fn on_reaction_add(&self, _ctx: &Context, event: &ReactionEvent) -> Result<()> {
        log_event!(
            "{} reacted to message {} with \"{}\"",
            display_user(event),
            event.message_id,
            event.emoji
        );
        Ok(())
    }

    async fn on_reaction_remove(&self, _ctx: &Context, event: &ReactionEvent) -> Result<()> {
        log_event!(
            "{} removed reaction \"{}\" from message {}",
            display_user(event),
            event.emoji,
            event.message_id
        );
        Ok(())
    }

    async fn on_guild_member_add(&self, _ctx: &Context, event: &MemberEvent) -> Result<()> {
        log_event!("{} joined guild {}", event.user.name, event.guild_id);
        Ok(())
    }

    async fn on_guild_member_remove(&self, _ctx: &Context, event: &MemberEvent) -> Result<()> {
        log_event!("{} left guild {}", event.user.name, event.guild_id);
        Ok(())
    }

    async fn on_guild_ban_add(&self, _ctx: &Context, event: &BanEvent) -> Result<()> {
        log_event!("{} was banned from guild {}", event.user.name, event.guild_id);
        Ok(())
    }

    async fn on_guild_ban_remove(&self, _ctx: &Context, event: &BanEvent) -> Result<()> {
        log_event!("{} was unbanned from guild {}", event.user.name, event.guild_id);
        Ok(())
    }
}

fn display_user(event: &ReactionEvent) -> String {
    event
        .user_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "<unknown-user>".to_owned())
}
