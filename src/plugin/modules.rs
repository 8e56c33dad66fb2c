use crate::{
    discord::Embed,
    error::CommandError,
    helper::{parse_channel, parse_role},
    i18n::{get_text, get_text_f},
    permissions::{require_admin, Module, ModulePermissionEntry, PermissionTarget},
    plugin::*,
};
use anyhow::Result;

/// Allow or deny module groups per channel and role
pub struct PluginModules;

fn parse_target(s: &str) -> Option<PermissionTarget> {
    if s.trim_start().starts_with("<#") {
        return parse_channel(s).map(PermissionTarget::Channel);
    }
    if s.trim_start().starts_with("<@&") {
        return parse_role(s).map(PermissionTarget::Role);
    }
    None
}

fn describe(target: PermissionTarget) -> String {
    match target {
        PermissionTarget::Channel(id) => format!("<#{}>", id),
        PermissionTarget::Role(id) => format!("<@&{}>", id),
    }
}

fn names(bits: u64) -> String {
    let names = Module::from_bits_truncate(bits).user_names();
    if names.is_empty() {
        "-".to_owned()
    } else {
        names.join(", ")
    }
}

#[serenity::async_trait]
impl Plugin for PluginModules {
    fn name(&self) -> &'static str {
        "modules"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["modules"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{}modules [allow|deny <module> <#channel|@role> | reset] - module permissions",
            prefix
        ))
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        let Some(guild_id) = inv.msg.guild_id else {
            return Ok(());
        };
        if !require_admin(ctx, &inv.msg).await? {
            return Ok(());
        }

        let args: Vec<&str> = inv.args.split_whitespace().collect();
        match args.as_slice() {
            [] => {
                let settings = ctx.settings.get(guild_id).await?;
                if settings.module_permissions.is_empty() {
                    ctx.reply(&inv.msg, &get_text("plugins.modules.list-empty"))
                        .await?;
                    return Ok(());
                }

                let embed = settings.module_permissions.iter().fold(
                    Embed::new().title(get_text("plugins.modules.list-title")),
                    |embed, entry| {
                        embed.field(
                            describe(entry.target),
                            format!(
                                "Allowed: {}\nDenied: {}",
                                names(entry.allowed),
                                names(entry.denied)
                            ),
                            false,
                        )
                    },
                );
                ctx.discord.send_embed(inv.msg.channel_id, &embed).await?;
            }
            ["reset"] => {
                ctx.settings
                    .update(guild_id, |s| s.module_permissions.clear())
                    .await?;
                ctx.reply(&inv.msg, &get_text("plugins.modules.reset"))
                    .await?;
            }
            [op @ ("allow" | "deny"), module, target] => {
                let Some(module) = Module::from_user_name(module) else {
                    let known = Module::all().user_names().join(", ");
                    ctx.reply(
                        &inv.msg,
                        &get_text_f("plugins.modules.unknown-module", &[&known]),
                    )
                    .await?;
                    return Ok(());
                };
                let target = parse_target(target).ok_or(CommandError::InvalidArguments)?;
                let allow = *op == "allow";

                ctx.settings
                    .update(guild_id, |s| {
                        let index = match s
                            .module_permissions
                            .iter()
                            .position(|e| e.target == target)
                        {
                            Some(index) => index,
                            None => {
                                s.module_permissions.push(ModulePermissionEntry::new(target));
                                s.module_permissions.len() - 1
                            }
                        };
                        let entry = &mut s.module_permissions[index];
                        if allow {
                            entry.allow(module);
                        } else {
                            entry.deny(module);
                        }
                    })
                    .await?;
                ctx.reply(&inv.msg, &get_text("plugins.modules.updated"))
                    .await?;
            }
            ["allow" | "deny", ..] => return Err(CommandError::TooFewArguments.into()),
            _ => return Err(CommandError::InvalidArguments.into()),
        }
        Ok(())
    }
}
