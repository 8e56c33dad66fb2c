use crate::{
    discord::Embed,
    error::CommandError,
    helper::split_command,
    i18n::get_text,
    permissions::{check_module, require_mod, require_module, Module},
    plugin::*,
    store::TypedStore,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use serenity::all::{GuildId, UserId};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

const COLLECTION: &str = "custom_commands";
const TOP_COUNT: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct CustomCommand {
    guild_id: GuildId,
    keyword: String,
    content: String,
    created_by: UserId,
    created_at: DateTime<Utc>,
    #[serde(default)]
    triggered: u64,
}

fn filter(guild_id: GuildId, keyword: &str) -> serde_json::Value {
    json!({ "guild_id": guild_id, "keyword": keyword })
}

/// Per-guild canned replies, triggered with the guild's prefix like any command
pub struct PluginCustomCommands {
    cache: RwLock<HashMap<GuildId, Vec<CustomCommand>>>,
    // Serializes the duplicate check against the insert.
    adding: Mutex<()>,
}

impl PluginCustomCommands {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            adding: Mutex::new(()),
        }
    }

    async fn reload(&self, ctx: &Context) -> Result<()> {
        let commands: Vec<CustomCommand> = ctx.store.find_all_as(COLLECTION, &json!({})).await?;

        let mut cache = HashMap::<GuildId, Vec<CustomCommand>>::new();
        for command in commands {
            cache.entry(command.guild_id).or_default().push(command);
        }
        *self.cache.write().await = cache;
        Ok(())
    }

    async fn find(&self, guild_id: GuildId, keyword: &str) -> Option<CustomCommand> {
        self.cache
            .read()
            .await
            .get(&guild_id)?
            .iter()
            .find(|c| c.keyword == keyword)
            .cloned()
    }

    async fn add(
        &self,
        ctx: &Context,
        inv: &Invocation,
        guild_id: GuildId,
        args: &str,
    ) -> Result<()> {
        let (keyword, content) = args
            .split_once(char::is_whitespace)
            .map(|(k, c)| (k, c.trim()))
            .ok_or(CommandError::TooFewArguments)?;
        if content.is_empty() {
            return Err(CommandError::TooFewArguments.into());
        }
        if !require_mod(ctx, &inv.msg).await? {
            return Ok(());
        }

        if ctx.registry.is_command(keyword) {
            ctx.reply(
                &inv.msg,
                &get_text("plugins.customcommands.add-command-already-exists"),
            )
            .await?;
            return Ok(());
        }
        let _adding = self.adding.lock().await;
        if self.find(guild_id, keyword).await.is_some() {
            ctx.reply(
                &inv.msg,
                &get_text("plugins.customcommands.add-keyword-already-exists"),
            )
            .await?;
            return Ok(());
        }

        let command = CustomCommand {
            guild_id,
            keyword: keyword.to_owned(),
            content: content.to_owned(),
            created_by: inv.msg.author.id,
            created_at: Utc::now(),
            triggered: 0,
        };
        ctx.store.insert_as(COLLECTION, &command).await?;
        self.reload(ctx).await?;

        ctx.reply(&inv.msg, &get_text("plugins.customcommands.add-success"))
            .await?;
        Ok(())
    }

    async fn delete(
        &self,
        ctx: &Context,
        inv: &Invocation,
        guild_id: GuildId,
        keyword: Option<&str>,
    ) -> Result<()> {
        let keyword = keyword.ok_or(CommandError::TooFewArguments)?;
        if !require_mod(ctx, &inv.msg).await? {
            return Ok(());
        }

        let removed = ctx.store.delete(COLLECTION, &filter(guild_id, keyword)).await?;
        let text = if removed == 0 {
            get_text("plugins.customcommands.delete-not-found")
        } else {
            self.reload(ctx).await?;
            get_text("plugins.customcommands.delete-success")
        };
        ctx.reply(&inv.msg, &text).await?;
        Ok(())
    }

    async fn list(
        &self,
        ctx: &Context,
        inv: &Invocation,
        guild_id: GuildId,
        top: bool,
    ) -> Result<()> {
        let mut commands = self
            .cache
            .read()
            .await
            .get(&guild_id)
            .cloned()
            .unwrap_or_default();
        if commands.is_empty() {
            ctx.reply(&inv.msg, &get_text("plugins.customcommands.list-empty"))
                .await?;
            return Ok(());
        }

        if top {
            commands.sort_by(|a, b| b.triggered.cmp(&a.triggered).then(a.keyword.cmp(&b.keyword)));
            commands.truncate(TOP_COUNT);
        } else {
            commands.sort_by(|a, b| a.keyword.cmp(&b.keyword));
        }

        let prefix = ctx.prefix(Some(guild_id)).await?;
        let lines: Vec<String> = commands
            .iter()
            .map(|c| format!("`{}{}` ({} uses)", prefix, c.keyword, c.triggered))
            .collect();
        let embed = Embed::new()
            .title(get_text("plugins.customcommands.list-title"))
            .description(lines.join("\n"));
        ctx.discord.send_embed(inv.msg.channel_id, &embed).await?;
        Ok(())
    }

    /// Bump the trigger counter in the cache and the store.
    ///
    /// The cache lock is held until the store write lands.
    async fn count_trigger(&self, ctx: &Context, guild_id: GuildId, keyword: &str) -> Result<()> {
        let mut cache = self.cache.write().await;
        let Some(command) = cache
            .get_mut(&guild_id)
            .and_then(|commands| commands.iter_mut().find(|c| c.keyword == keyword))
        else {
            return Ok(());
        };

        command.triggered += 1;
        ctx.store
            .update_as(COLLECTION, &filter(guild_id, keyword), &*command)
            .await?;
        Ok(())
    }
}

impl Default for PluginCustomCommands {
    fn default() -> Self {
        Self::new()
    }
}

#[serenity::async_trait]
impl Plugin for PluginCustomCommands {
    fn name(&self) -> &'static str {
        "customcommands"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["commands", "command", "customcommands"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{}commands [add <keyword> <text> | delete <keyword> | list [top]] - custom commands",
            prefix
        ))
    }

    fn callbacks(&self) -> Callbacks {
        Callbacks::MESSAGE
    }

    async fn init(&self, ctx: &Context) -> Result<()> {
        self.reload(ctx).await
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        let Some(guild_id) = inv.msg.guild_id else {
            return Ok(());
        };
        if !require_module(ctx, &inv.msg, Module::CUSTOM_COMMANDS).await? {
            return Ok(());
        }

        let (sub, rest) = match inv.args.split_once(char::is_whitespace) {
            Some((sub, rest)) => (sub, rest.trim()),
            None => (inv.args.as_str(), ""),
        };
        match sub {
            "add" => self.add(ctx, inv, guild_id, rest).await,
            "delete" | "remove" => {
                self.delete(ctx, inv, guild_id, rest.split_whitespace().next())
                    .await
            }
            "" | "list" => self.list(ctx, inv, guild_id, rest == "top").await,
            "top" => self.list(ctx, inv, guild_id, true).await,
            _ => Err(CommandError::InvalidArguments.into()),
        }
    }

    async fn on_message(&self, ctx: &Context, msg: &IncomingMessage) -> Result<()> {
        let Some(guild_id) = msg.guild_id else {
            return Ok(());
        };
        let prefix = ctx.prefix(Some(guild_id)).await?;
        let Some((keyword, _)) = split_command(&msg.content, &prefix) else {
            return Ok(());
        };
        // Built-in commands always win.
        if ctx.registry.is_command(keyword) {
            return Ok(());
        }
        let Some(command) = self.find(guild_id, keyword).await else {
            return Ok(());
        };
        if !check_module(ctx, msg, Module::CUSTOM_COMMANDS).await {
            return Ok(());
        }

        ctx.reply(msg, &command.content).await?;
        self.count_trigger(ctx, guild_id, keyword).await
    }
}
