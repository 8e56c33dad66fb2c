//! Who may do what.
//!
//! Two independent layers: user levels (bot admin, bot moderator, guild admin, guild moderator) and
//! per-guild module permissions, which switch whole feature groups on or off per channel or role.

use crate::{
    context::Context, discord::MemberInfo, error::CommandError, error::PermissionLevel,
    event::IncomingMessage,
};
use anyhow::Result;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serenity::all::{ChannelId, GuildId, RoleId, UserId};

/// Role names which make their holders admins on guilds without configured admin roles
const ADMIN_ROLE_NAMES: &[&str] = &["Admin", "Admins", "ADMIN", "School Board", "admin", "admins"];

/// Same for moderators
const MOD_ROLE_NAMES: &[&str] = &[
    "Mod",
    "Mods",
    "Mod Trainee",
    "Moderator",
    "Moderators",
    "MOD",
    "Minimod",
    "Guard",
    "Janitor",
    "mod",
    "mods",
    "Budget Admin",
];

/// Reaction added to commands a module permission blocked
pub const DENIED_REACTION: &str = "🚫";

pub async fn is_bot_admin(ctx: &Context, user_id: UserId) -> bool {
    ctx.cfg.read().await.is_bot_owner(user_id)
}

pub async fn is_bot_moderator(ctx: &Context, user_id: UserId) -> bool {
    ctx.cfg.read().await.is_bot_moderator(user_id)
}

fn member_is_admin(member: &MemberInfo, admin_role_ids: &[RoleId]) -> bool {
    if member.user_id == member.guild_owner {
        return true;
    }

    member.roles.iter().any(|role| {
        role.administrator
            || if admin_role_ids.is_empty() {
                ADMIN_ROLE_NAMES.contains(&role.name.as_str())
            } else {
                admin_role_ids.contains(&role.id)
            }
    })
}

fn member_is_mod(member: &MemberInfo, mod_role_ids: &[RoleId]) -> bool {
    member.roles.iter().any(|role| {
        if mod_role_ids.is_empty() {
            MOD_ROLE_NAMES.contains(&role.name.as_str())
        } else {
            mod_role_ids.contains(&role.id)
        }
    })
}

pub async fn is_admin(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<bool> {
    if is_bot_admin(ctx, user_id).await {
        return Ok(true);
    }

    let settings = ctx.settings.get(guild_id).await?;
    let member = ctx.discord.member(guild_id, user_id).await?;
    Ok(member_is_admin(&member, &settings.admin_role_ids))
}

pub async fn is_mod(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<bool> {
    if is_bot_admin(ctx, user_id).await {
        return Ok(true);
    }

    let settings = ctx.settings.get(guild_id).await?;
    let member = ctx.discord.member(guild_id, user_id).await?;
    Ok(member_is_admin(&member, &settings.admin_role_ids)
        || member_is_mod(&member, &settings.mod_role_ids))
}

async fn deny(ctx: &Context, msg: &IncomingMessage, level: PermissionLevel) -> Result<bool> {
    ctx.reply(msg, &CommandError::NoPermission(level).reply())
        .await?;
    Ok(false)
}

/// Whether the author is a guild admin.  Answers with the no-permission text if not.
pub async fn require_admin(ctx: &Context, msg: &IncomingMessage) -> Result<bool> {
    let Some(guild_id) = msg.guild_id else {
        return deny(ctx, msg, PermissionLevel::Admin).await;
    };
    if is_admin(ctx, guild_id, msg.author.id).await? {
        return Ok(true);
    }
    deny(ctx, msg, PermissionLevel::Admin).await
}

/// Whether the author is a guild moderator.  Answers with the no-permission text if not.
pub async fn require_mod(ctx: &Context, msg: &IncomingMessage) -> Result<bool> {
    let Some(guild_id) = msg.guild_id else {
        return deny(ctx, msg, PermissionLevel::Mod).await;
    };
    if is_mod(ctx, guild_id, msg.author.id).await? {
        return Ok(true);
    }
    deny(ctx, msg, PermissionLevel::Mod).await
}

pub async fn require_bot_admin(ctx: &Context, msg: &IncomingMessage) -> Result<bool> {
    if is_bot_admin(ctx, msg.author.id).await {
        return Ok(true);
    }
    deny(ctx, msg, PermissionLevel::BotAdmin).await
}

pub async fn require_bot_moderator(ctx: &Context, msg: &IncomingMessage) -> Result<bool> {
    if is_bot_moderator(ctx, msg.author.id).await {
        return Ok(true);
    }
    deny(ctx, msg, PermissionLevel::BotModerator).await
}

bitflags! {
    /// Feature groups which can be allowed or denied per channel and role
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Module: u64 {
        const STATS = 1 << 0;
        const CHOICE = 1 << 1;
        const EIGHT_BALL = 1 << 2;
        const RPS = 1 << 3;
        const ANIMALS = 1 << 4;
        const ISUP = 1 << 5;
        const REMINDERS = 1 << 6;
        const CUSTOM_COMMANDS = 1 << 7;
        const REACTION_POLLS = 1 << 8;
        const AUTO_ROLE = 1 << 9;
    }
}

/// User facing module names
const MODULE_NAMES: &[(&str, Module)] = &[
    ("stats", Module::STATS),
    ("choice", Module::CHOICE),
    ("8ball", Module::EIGHT_BALL),
    ("rps", Module::RPS),
    ("animals", Module::ANIMALS),
    ("isup", Module::ISUP),
    ("reminders", Module::REMINDERS),
    ("customcommands", Module::CUSTOM_COMMANDS),
    ("reactionpolls", Module::REACTION_POLLS),
    ("autoroles", Module::AUTO_ROLE),
];

impl Module {
    /// Parse a user facing module name.  `all` selects every module.
    pub fn from_user_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("all") {
            return Some(Module::all());
        }
        MODULE_NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, module)| *module)
    }

    /// User facing names of the contained modules
    pub fn user_names(self) -> Vec<&'static str> {
        MODULE_NAMES
            .iter()
            .filter(|(_, module)| self.contains(*module))
            .map(|(name, _)| *name)
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum PermissionTarget {
    Channel(ChannelId),
    Role(RoleId),
}

/// Allowed and denied modules for one channel or role
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePermissionEntry {
    pub target: PermissionTarget,
    pub allowed: u64,
    pub denied: u64,
}

impl ModulePermissionEntry {
    pub fn new(target: PermissionTarget) -> Self {
        Self {
            target,
            allowed: 0,
            denied: 0,
        }
    }

    fn allows(&self, module: Module) -> bool {
        Module::from_bits_truncate(self.allowed).intersects(module)
    }

    fn denies(&self, module: Module) -> bool {
        Module::from_bits_truncate(self.denied).intersects(module)
    }

    /// Allow `module` here, replacing a previous denial
    pub fn allow(&mut self, module: Module) {
        self.allowed |= module.bits();
        self.denied &= !module.bits();
    }

    /// Deny `module` here, replacing a previous allowance
    pub fn deny(&mut self, module: Module) {
        self.denied |= module.bits();
        self.allowed &= !module.bits();
    }
}

/// Decide whether `module` may be used in `channel_id` by a member holding `role_ids`.
///
/// Role allowances beat role denials, which beat channel allowances, which beat channel
/// denials.  Anything not mentioned is allowed.
pub fn module_allowed(
    entries: &[ModulePermissionEntry],
    channel_id: ChannelId,
    role_ids: &[RoleId],
    module: Module,
) -> bool {
    let roles = || {
        entries.iter().filter(|e| match e.target {
            PermissionTarget::Role(id) => role_ids.contains(&id),
            PermissionTarget::Channel(_) => false,
        })
    };
    let channel = || {
        entries
            .iter()
            .filter(|e| e.target == PermissionTarget::Channel(channel_id))
    };

    if roles().any(|e| e.allows(module)) {
        return true;
    }
    if roles().any(|e| e.denies(module)) {
        return false;
    }
    if channel().any(|e| e.allows(module)) {
        return true;
    }
    if channel().any(|e| e.denies(module)) {
        return false;
    }
    true
}

/// The implicit role every member has
pub fn everyone_role(guild_id: GuildId) -> RoleId {
    RoleId::new(guild_id.get())
}

/// Whether the module may run for `msg`.  Fails open when the data needed to decide is missing.
pub async fn check_module(ctx: &Context, msg: &IncomingMessage, module: Module) -> bool {
    let Some(guild_id) = msg.guild_id else {
        return true;
    };

    let settings = match ctx.settings.get(guild_id).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Could not load settings of guild {} for module check: {}", guild_id, e);
            return true;
        }
    };
    if settings.module_permissions.is_empty() {
        return true;
    }

    let member = match ctx.discord.member(guild_id, msg.author.id).await {
        Ok(member) => member,
        Err(e) => {
            tracing::warn!("Could not fetch member {} for module check: {}", msg.author.id, e);
            return true;
        }
    };

    let mut role_ids: Vec<RoleId> = member.roles.iter().map(|r| r.id).collect();
    role_ids.push(everyone_role(guild_id));

    module_allowed(&settings.module_permissions, msg.channel_id, &role_ids, module)
}

/// Like `check_module`, but marks a blocked command with `DENIED_REACTION`
pub async fn require_module(ctx: &Context, msg: &IncomingMessage, module: Module) -> Result<bool> {
    if check_module(ctx, msg, module).await {
        return Ok(true);
    }
    ctx.discord
        .add_reaction(msg.channel_id, msg.id, DENIED_REACTION)
        .await?;
    Ok(false)
}
