use crate::{
    error::CommandError,
    helper::parse_role,
    i18n::{get_text, get_text_f},
    permissions::{require_admin, require_module, Module},
    plugin::*,
    store::TypedStore,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serenity::all::{GuildId, RoleId};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

const COLLECTION: &str = "auto_roles";

/// Roles handed to every member who joins
pub struct PluginAutoRoles {
    // Per-guild, held across load and save of the role list.
    locks: Mutex<HashMap<GuildId, Arc<Mutex<()>>>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AutoRoles {
    guild_id: GuildId,
    #[serde(default)]
    role_ids: Vec<RoleId>,
}

async fn load(ctx: &Context, guild_id: GuildId) -> Result<Vec<RoleId>> {
    let doc: Option<AutoRoles> = ctx
        .store
        .find_one_as(COLLECTION, &json!({ "guild_id": guild_id }))
        .await?;
    Ok(doc.map(|d| d.role_ids).unwrap_or_default())
}

async fn save(ctx: &Context, guild_id: GuildId, role_ids: Vec<RoleId>) -> Result<()> {
    ctx.store
        .upsert_as(
            COLLECTION,
            &json!({ "guild_id": guild_id }),
            &AutoRoles { guild_id, role_ids },
        )
        .await
}

impl PluginAutoRoles {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, guild_id: GuildId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(guild_id)
            .or_default()
            .clone()
    }

    async fn add(
        &self,
        ctx: &Context,
        inv: &Invocation,
        guild_id: GuildId,
        role_id: RoleId,
    ) -> Result<()> {
        let lock = self.lock_for(guild_id).await;
        let guard = lock.lock().await;
        let mut roles = load(ctx, guild_id).await?;
        if roles.contains(&role_id) {
            drop(guard);
            ctx.reply(&inv.msg, &get_text_f("plugins.autoroles.add-already", &[&role_id]))
                .await?;
            return Ok(());
        }

        roles.push(role_id);
        save(ctx, guild_id, roles).await?;
        drop(guard);
        ctx.reply(&inv.msg, &get_text_f("plugins.autoroles.add-success", &[&role_id]))
            .await?;
        Ok(())
    }

    async fn remove(
        &self,
        ctx: &Context,
        inv: &Invocation,
        guild_id: GuildId,
        role_id: RoleId,
    ) -> Result<()> {
        let lock = self.lock_for(guild_id).await;
        let guard = lock.lock().await;
        let mut roles = load(ctx, guild_id).await?;
        let before = roles.len();
        roles.retain(|r| *r != role_id);

        let text = if roles.len() == before {
            get_text_f("plugins.autoroles.remove-not-found", &[&role_id])
        } else {
            save(ctx, guild_id, roles).await?;
            get_text_f("plugins.autoroles.remove-success", &[&role_id])
        };
        drop(guard);
        ctx.reply(&inv.msg, &text).await?;
        Ok(())
    }

    async fn list(&self, ctx: &Context, inv: &Invocation, guild_id: GuildId) -> Result<()> {
        let roles = load(ctx, guild_id).await?;
        let text = if roles.is_empty() {
            get_text("plugins.autoroles.list-empty")
        } else {
            let mentions: Vec<String> = roles.iter().map(|r| format!("<@&{}>", r)).collect();
            get_text_f("plugins.autoroles.list", &[&mentions.join(", ")])
        };
        ctx.reply(&inv.msg, &text).await?;
        Ok(())
    }
}

impl Default for PluginAutoRoles {
    fn default() -> Self {
        Self::new()
    }
}

#[serenity::async_trait]
impl Plugin for PluginAutoRoles {
    fn name(&self) -> &'static str {
        "autoroles"
    }

    fn commands(&self) -> &'static [&'static str] {
        &["autorole", "autoroles"]
    }

    fn usage(&self, prefix: &str) -> Option<String> {
        Some(format!(
            "{}autorole [add|remove <role>] - roles given to new members",
            prefix
        ))
    }

    fn callbacks(&self) -> Callbacks {
        Callbacks::GUILD_MEMBER_ADD
    }

    async fn action(&self, ctx: &Context, inv: &Invocation) -> Result<()> {
        let Some(guild_id) = inv.msg.guild_id else {
            return Ok(());
        };
        if !require_module(ctx, &inv.msg, Module::AUTO_ROLE).await? {
            return Ok(());
        }
        if !require_admin(ctx, &inv.msg).await? {
            return Ok(());
        }

        let args: Vec<&str> = inv.args.split_whitespace().collect();
        match args.as_slice() {
            [] | ["list"] => self.list(ctx, inv, guild_id).await,
            [sub @ ("add" | "remove"), role] => {
                let role_id = parse_role(role).ok_or(CommandError::InvalidArguments)?;
                if *sub == "add" {
                    self.add(ctx, inv, guild_id, role_id).await
                } else {
                    self.remove(ctx, inv, guild_id, role_id).await
                }
            }
            ["add" | "remove"] => Err(CommandError::TooFewArguments.into()),
            _ => Err(CommandError::InvalidArguments.into()),
        }
    }

    async fn on_guild_member_add(&self, ctx: &Context, event: &MemberEvent) -> Result<()> {
        for role_id in load(ctx, event.guild_id).await? {
            // One deleted role must not keep the others from being assigned.
            if let Err(e) = ctx
                .discord
                .add_member_role(event.guild_id, event.user.id, role_id)
                .await
            {
                tracing::warn!(
                    "Could not give auto role {} to {} in guild {}: {:#}",
                    role_id,
                    event.user.id,
                    event.guild_id,
                    e
                );
            }
        }
        Ok(())
    }
}
