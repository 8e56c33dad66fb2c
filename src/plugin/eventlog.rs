use crate::{
    error::CommandError,
    helper::parse_channel,
    i18n::{get_text, get_text_f},
    permissions::require_admin,
    plugin::*,
};
use anyhow::Result;
use serenity::all::GuildId;

/// Posts member, ban and deletion events to a per-guild log channel
pub struct PluginEventLog;

impl PluginEventLog {
    async fn post(&self, ctx: &Context, guild_id: GuildId, line: String) -> Result<()> {
        let Some(channel_id) = ctx.settings.get(guild_id).await?.eventlog_channel_id else {
            return Ok(());
        };
        ctx.discord.send_message(channel_id, &line).await?;
        Ok(())
    }
}

#[serenity::async_trait]
impl Plugin for PluginEventLog {
    fn name(&self) -> &'static str {
        "eventlog"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["eventlog"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{}eventlog set <#channel> | disable - log server events",
            prefix
        ))
    }

    fn callbacks(&self) -> Callbacks {
        Callbacks::GUILD_MEMBER_ADD
            | Callbacks::GUILD_MEMBER_REMOVE
            | Callbacks::GUILD_BAN_ADD
            | Callbacks::GUILD_BAN_REMOVE
            | Callbacks::MESSAGE_DELETE
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        let Some(guild_id) = inv.msg.guild_id else {
            return Ok(());
        };

        let args: Vec<&str> = inv.args.split_whitespace().collect();
        let channel = match args.as_slice() {
            ["set", channel] => Some(parse_channel(channel).ok_or(CommandError::InvalidArguments)?),
            ["disable"] => None,
            [] | ["set"] => return Err(CommandError::TooFewArguments.into()),
            _ => return Err(CommandError::InvalidArguments.into()),
        };
        if !require_admin(ctx, &inv.msg).await? {
            return Ok(());
        }

        ctx.settings
            .update(guild_id, move |s| s.eventlog_channel_id = channel)
            .await?;
        let text = match channel {
            Some(channel_id) => get_text_f("plugins.eventlog.set-success", &[&channel_id]),
            None => get_text("plugins.eventlog.disabled"),
        };
        ctx.reply(&inv.msg, &text).await?;
        Ok(())
    }

    async fn on_guild_member_add(&self, ctx: &Context, event: &MemberEvent) -> Result<()> {
        let line = get_text_f(
            "plugins.eventlog.member-join",
            &[&event.user.id, &event.user.name],
        );
        self.post(ctx, event.guild_id, line).await
    }

    async fn on_guild_member_remove(&self, ctx: &Context, event: &MemberEvent) -> Result<()> {
        let line = get_text_f(
            "plugins.eventlog.member-leave",
            &[&event.user.id, &event.user.name],
        );
        self.post(ctx, event.guild_id, line).await
    }

    async fn on_guild_ban_add(&self, ctx: &Context, event: &BanEvent) -> Result<()> {
        let line = get_text_f("plugins.eventlog.ban-add", &[&event.user.id, &event.user.name]);
        self.post(ctx, event.guild_id, line).await
    }

    async fn on_guild_ban_remove(&self, ctx: &Context, event: &BanEvent) -> Result<()> {
        let line = get_text_f(
            "plugins.eventlog.ban-remove",
            &[&event.user.id, &event.user.name],
        );
        self.post(ctx, event.guild_id, line).await
    }

    async fn on_message_delete(&self, ctx: &Context, event: &MessageDeleteEvent) -> Result<()> {
        let Some(guild_id) = event.guild_id else {
            return Ok(());
        };
        let line = get_text_f(
            "plugins.eventlog.message-delete",
            &[&event.message_id, &event.channel_id],
        );
        self.post(ctx, guild_id, line).await
    }
}
