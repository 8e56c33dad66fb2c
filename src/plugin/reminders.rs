//! Reminders, delivered by DM once they are due.
//!
//! Pending reminders live in the store.  A background loop, started in `init` and kept alive by the
//! supervisor, polls for due ones.

use crate::{
    discord::Embed,
    error::CommandError,
    helper::parse_duration,
    i18n::{get_text, get_text_f},
    log_internal,
    permissions::{require_module, Module},
    plugin::*,
    store::{TypedStore, ID_FIELD},
    supervisor::spawn_supervised,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use serenity::all::{ChannelId, GuildId, UserId};
use std::time::Duration;
use tokio::{sync::Mutex, task::JoinHandle};

const COLLECTION: &str = "reminders";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Reminder {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    user_id: UserId,
    channel_id: ChannelId,
    guild_id: Option<GuildId>,
    message: String,
    due_at: DateTime<Utc>,
}

pub struct PluginReminders {
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl PluginReminders {
    pub fn new() -> Self {
        Self {
            poller: Mutex::new(None),
        }
    }

    async fn remind(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        let Some((message, delay)) = parse_reminder(&inv.args) else {
            ctx.reply(&inv.msg, &get_text("plugins.reminders.format"))
                .await?;
            return Ok(());
        };
        let delay = chrono::Duration::from_std(delay).map_err(|_| CommandError::InvalidArguments)?;
        let due_at = Utc::now()
            .checked_add_signed(delay)
            .ok_or(CommandError::InvalidArguments)?;

        let reminder = Reminder {
            id: None,
            user_id: inv.msg.author.id,
            channel_id: inv.msg.channel_id,
            guild_id: inv.msg.guild_id,
            message,
            due_at,
        };
        ctx.store.insert_as(COLLECTION, &reminder).await?;

        ctx.reply(&inv.msg, &get_text("plugins.reminders.set"))
            .await?;
        Ok(())
    }

    async fn list(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        let mut reminders: Vec<Reminder> = ctx
            .store
            .find_all_as(COLLECTION, &json!({ "user_id": inv.msg.author.id }))
            .await?;
        if reminders.is_empty() {
            ctx.reply(&inv.msg, &get_text("plugins.reminders.empty"))
                .await?;
            return Ok(());
        }

        reminders.sort_by_key(|r| r.due_at);
        let embed = reminders.iter().fold(
            Embed::new().title(get_text("plugins.reminders.title")),
            |embed, r| {
                let name = if r.message.is_empty() {
                    "-".to_owned()
                } else {
                    r.message.clone()
                };
                embed.field(
                    name,
                    format!("<t:{}:R> in <#{}>", r.due_at.timestamp(), r.channel_id),
                    false,
                )
            },
        );
        ctx.discord.send_embed(inv.msg.channel_id, &embed).await?;
        Ok(())
    }
}

impl Default for PluginReminders {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `tea in 5m` into the text and the delay.  The last ` in ` separates them, so the text
/// may contain the word itself.
fn parse_reminder(args: &str) -> Option<(String, Duration)> {
    let args = args.trim();
    let (text, when) = match args.strip_prefix("in ") {
        Some(when) => ("", when),
        None => args.rsplit_once(" in ")?,
    };
    let delay = parse_duration(when)?;
    Some((text.trim().to_owned(), delay))
}

/// DM every due reminder and forget it.  Returns how many were due.
async fn deliver_due(ctx: &Context, now: DateTime<Utc>) -> Result<usize> {
    let reminders: Vec<Reminder> = ctx.store.find_all_as(COLLECTION, &json!({})).await?;

    let mut delivered = 0;
    for reminder in reminders.into_iter().filter(|r| r.due_at <= now) {
        let text = if reminder.message.is_empty() {
            get_text("plugins.reminders.deliver-empty")
        } else {
            get_text_f("plugins.reminders.deliver", &[&reminder.message])
        };

        // A user with closed DMs would otherwise be retried forever.
        if let Err(e) = ctx
            .discord
            .send_direct_message(reminder.user_id, &text)
            .await
        {
            tracing::warn!("Could not deliver reminder to {}: {:#}", reminder.user_id, e);
        }

        if let Some(id) = &reminder.id {
            ctx.store
                .delete(COLLECTION, &json!({ ID_FIELD: id }))
                .await?;
        }
        delivered += 1;
    }
    Ok(delivered)
}

async fn poll(ctx: Context) -> Result<()> {
    let period = Duration::from_secs(ctx.cfg.read().await.reminders.poll_interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        deliver_due(&ctx, Utc::now()).await?;
    }
}

#[serenity::async_trait]
impl Plugin for PluginReminders {
    fn name(&self) -> &'static str {
        "reminders"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["remind", "remindme", "rm", "reminders", "rms"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{p}remind <what> in <when> - remind you by DM\n\
             {p}reminders - list your pending reminders",
            p = prefix
        ))
    }

    async fn init(&self, ctx: &Context) -> Result<()> {
        let backoff = Duration::from_secs(ctx.cfg.read().await.background.restart_backoff_secs);
        let ctx = ctx.clone();
        let handle = spawn_supervised("reminders", backoff, move || poll(ctx.clone()));

        if let Some(old) = self.poller.lock().await.replace(handle) {
            old.abort();
        }
        log_internal!("Started reminder loop");
        Ok(())
    }

    async fn uninit(&self, _ctx: &Context) -> Result<()> {
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        if !require_module(ctx, &inv.msg, Module::REMINDERS).await? {
            return Ok(());
        }
        ctx.discord.broadcast_typing(inv.msg.channel_id).await?;

        match inv.command.as_str() {
            "reminders" | "rms" => self.list(ctx, inv).await,
            _ => self.remind(ctx, inv).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, MockDiscord};

    #[test]
    fn reminder_text_and_delay() {
        assert_eq!(
            parse_reminder("tea in 5m"),
            Some(("tea".to_owned(), Duration::from_secs(300)))
        );
        assert_eq!(
            parse_reminder("check in on bob in 1 hour"),
            Some(("check in on bob".to_owned(), Duration::from_secs(3600)))
        );
        assert_eq!(
            parse_reminder("in 10s"),
            Some((String::new(), Duration::from_secs(10)))
        );
        assert_eq!(parse_reminder("tea tomorrow"), None);
        assert_eq!(parse_reminder("tea in a bit"), None);
    }

    #[tokio::test]
    async fn bad_format_is_explained() {
        let discord = MockDiscord::new();
        let ctx = testing::context(discord.clone()).await;

        PluginReminders::new()
            .action(&ctx, &testing::invocation("remind", "tea"))
            .await
            .unwrap();
        assert_eq!(
            discord.sent_texts(),
            vec![get_text("plugins.reminders.format")]
        );
    }

    #[tokio::test]
    async fn due_reminders_are_delivered_once() {
        let discord = MockDiscord::new();
        let ctx = testing::context(discord.clone()).await;
        let plugin = PluginReminders::new();

        plugin
            .action(&ctx, &testing::invocation("remindme", "tea in 5m"))
            .await
            .unwrap();
        plugin
            .action(&ctx, &testing::invocation("rm", "in 2h"))
            .await
            .unwrap();
        assert_eq!(
            discord.sent_texts(),
            vec![
                get_text("plugins.reminders.set"),
                get_text("plugins.reminders.set")
            ]
        );

        // Nothing is due yet.
        assert_eq!(deliver_due(&ctx, Utc::now()).await.unwrap(), 0);

        let later = Utc::now() + chrono::Duration::minutes(10);
        assert_eq!(deliver_due(&ctx, later).await.unwrap(), 1);
        assert_eq!(
            discord.direct_messages(),
            vec![(
                testing::USER,
                get_text_f("plugins.reminders.deliver", &[&"tea"])
            )]
        );
        assert_eq!(deliver_due(&ctx, later).await.unwrap(), 0);

        let much_later = Utc::now() + chrono::Duration::hours(3);
        assert_eq!(deliver_due(&ctx, much_later).await.unwrap(), 1);
        assert_eq!(
            discord.direct_messages()[1].1,
            get_text("plugins.reminders.deliver-empty")
        );
    }

    #[tokio::test]
    async fn lists_own_reminders() {
        let discord = MockDiscord::new();
        let ctx = testing::context(discord.clone()).await;
        let plugin = PluginReminders::new();

        plugin
            .action(&ctx, &testing::invocation("reminders", ""))
            .await
            .unwrap();
        assert_eq!(
            discord.sent_texts(),
            vec![get_text("plugins.reminders.empty")]
        );

        plugin
            .action(&ctx, &testing::invocation("remind", "b in 2h"))
            .await
            .unwrap();
        plugin
            .action(&ctx, &testing::invocation("remind", "a in 1h"))
            .await
            .unwrap();
        plugin
            .action(
                &ctx,
                &testing::invocation_from(testing::BOT_ADMIN, "remind", "other in 1h"),
            )
            .await
            .unwrap();
        plugin
            .action(&ctx, &testing::invocation("rms", ""))
            .await
            .unwrap();

        let embeds = discord.sent_embeds();
        assert_eq!(embeds.len(), 1);
        let names: Vec<&str> = embeds[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn background_loop_delivers_and_stops_on_uninit() {
        let discord = MockDiscord::new();
        let ctx = testing::context(discord.clone()).await;
        let plugin = PluginReminders::new();

        ctx.store
            .insert_as(
                COLLECTION,
                &Reminder {
                    id: None,
                    user_id: testing::USER,
                    channel_id: testing::CHANNEL,
                    guild_id: Some(testing::GUILD),
                    message: "stretch".to_owned(),
                    due_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        plugin.init(&ctx).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(discord.direct_messages().len(), 1);

        plugin.uninit(&ctx).await.unwrap();
        assert!(plugin.poller.lock().await.is_none());
    }
}
