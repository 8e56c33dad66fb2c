//! Per-guild settings: the prefix and the admin and moderator role lists.
//!
//! The prefix can also be queried and changed by mentioning the bot, which is the only way to
//! find it once it has been forgotten.

use crate::{
    error::CommandError,
    helper::parse_role,
    i18n::{get_text, get_text_f},
    permissions::require_admin,
    plugin::*,
    settings::GuildSettings,
};
use anyhow::Result;
use serenity::all::{GuildId, RoleId};

pub struct PluginConfig;

const MAX_PREFIX_LEN: usize = 16;

#[derive(Clone, Copy)]
enum RoleList {
    Admin,
    Mod,
}

impl RoleList {
    fn label(self) -> &'static str {
        match self {
            RoleList::Admin => "admin",
            RoleList::Mod => "moderator",
        }
    }

    fn roles(self, settings: &mut GuildSettings) -> &mut Vec<RoleId> {
        match self {
            RoleList::Admin => &mut settings.admin_role_ids,
            RoleList::Mod => &mut settings.mod_role_ids,
        }
    }
}

fn mention_roles(roles: &[RoleId]) -> String {
    if roles.is_empty() {
        return "-".to_owned();
    }
    roles
        .iter()
        .map(|r| format!("<@&{}>", r))
        .collect::<Vec<_>>()
        .join(", ")
}

impl PluginConfig {
    async fn set_prefix(
        &self,
        ctx: &Context,
        msg: &IncomingMessage,
        guild_id: GuildId,
        prefix: &str,
    ) -> Result<()> {
        if prefix.is_empty()
            || prefix.len() > MAX_PREFIX_LEN
            || prefix.contains(char::is_whitespace)
        {
            return Err(CommandError::InvalidArguments.into());
        }
        if !require_admin(ctx, msg).await? {
            return Ok(());
        }

        ctx.settings
            .update(guild_id, |s| s.prefix = prefix.to_owned())
            .await?;
        ctx.reply(msg, &get_text_f("plugins.config.prefix-set-success", &[&prefix]))
            .await?;
        Ok(())
    }

    async fn edit_roles(
        &self,
        ctx: &Context,
        inv: &Invocation,
        guild_id: GuildId,
        list: RoleList,
        args: &[&str],
    ) -> Result<()> {
        let [op, role] = args else {
            return Err(CommandError::TooFewArguments.into());
        };
        let role_id = parse_role(role).ok_or(CommandError::InvalidArguments)?;
        if !require_admin(ctx, &inv.msg).await? {
            return Ok(());
        }

        let key = match *op {
            "add" => {
                ctx.settings
                    .update(guild_id, |s| {
                        let roles = list.roles(s);
                        if !roles.contains(&role_id) {
                            roles.push(role_id);
                        }
                    })
                    .await?;
                "plugins.config.role-added"
            }
            "remove" => {
                let mut removed = false;
                ctx.settings
                    .update(guild_id, |s| {
                        let roles = list.roles(s);
                        let before = roles.len();
                        roles.retain(|r| *r != role_id);
                        removed = roles.len() != before;
                    })
                    .await?;
                if removed {
                    "plugins.config.role-removed"
                } else {
                    "plugins.config.role-not-listed"
                }
            }
            _ => return Err(CommandError::InvalidArguments.into()),
        };

        ctx.reply(&inv.msg, &get_text_f(key, &[&role_id, &list.label()]))
            .await?;
        Ok(())
    }

    async fn summary(&self, ctx: &Context, inv: &Invocation, guild_id: GuildId) -> Result<()> {
        let settings = ctx.settings.get(guild_id).await?;
        let eventlog = settings
            .eventlog_channel_id
            .map(|c| format!("<#{}>", c))
            .unwrap_or_else(|| "-".to_owned());

        let text = get_text_f(
            "plugins.config.summary",
            &[
                &settings.prefix,
                &mention_roles(&settings.admin_role_ids),
                &mention_roles(&settings.mod_role_ids),
                &eventlog,
            ],
        );
        ctx.reply(&inv.msg, &text).await?;
        Ok(())
    }
}

#[serenity::async_trait]
impl Plugin for PluginConfig {
    fn name(&self) -> &'static str {
        "config"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["config"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{}config [prefix <prefix> | adminrole|modrole add|remove <role>] - server settings",
            prefix
        ))
    }

    fn callbacks(&self) -> Callbacks {
        Callbacks::MESSAGE
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        let Some(guild_id) = inv.msg.guild_id else {
            return Ok(());
        };

        let args: Vec<&str> = inv.args.split_whitespace().collect();
        match args.split_first() {
            None => self.summary(ctx, inv, guild_id).await,
            Some((&"prefix", [prefix])) => self.set_prefix(ctx, &inv.msg, guild_id, prefix).await,
            Some((&"prefix", _)) => Err(CommandError::TooFewArguments.into()),
            Some((&"adminrole", rest)) => {
                self.edit_roles(ctx, inv, guild_id, RoleList::Admin, rest)
                    .await
            }
            Some((&"modrole", rest)) => {
                self.edit_roles(ctx, inv, guild_id, RoleList::Mod, rest)
                    .await
            }
            Some(_) => Err(CommandError::InvalidArguments.into()),
        }
    }

    async fn on_message(&self, ctx: &Context, msg: &IncomingMessage) -> Result<()> {
        let Some(guild_id) = msg.guild_id else {
            return Ok(());
        };
        let Some(rest) = msg.strip_leading_mention(ctx.discord.current_user_id()) else {
            return Ok(());
        };

        let lower = rest.to_lowercase();
        if lower.starts_with("help") {
            let prefix = ctx.settings.prefix(guild_id).await?;
            ctx.reply(msg, &get_text_f("bot.help", &[&prefix])).await?;
        } else if lower.starts_with("prefix") {
            let prefix = ctx.settings.prefix(guild_id).await?;
            let text = if prefix.is_empty() {
                get_text("bot.prefix.not-set")
            } else {
                get_text_f("bot.prefix.is", &[&prefix])
            };
            ctx.reply(msg, &text).await?;
        } else if lower.starts_with("set prefix ") {
            let prefix = rest.get("set prefix ".len()..).unwrap_or_default().trim();
            if let Err(e) = self.set_prefix(ctx, msg, guild_id, prefix).await {
                match e.downcast_ref::<CommandError>() {
                    Some(err) => {
                        ctx.reply(msg, &err.reply()).await?;
                    }
                    None => return Err(e),
                }
            }
        }
        Ok(())
    }
}
