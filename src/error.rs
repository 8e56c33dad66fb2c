//! Failures which are the user's to fix, as opposed to bugs or outages.
//!
//! A plugin returns these through `anyhow`; the dispatch boundary downcasts and answers with the
//! localized text instead of the generic error message.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("too few arguments")]
    TooFewArguments,

    #[error("invalid arguments")]
    InvalidArguments,

    /// The named i18n key describes what was missing
    #[error("not found: {0}")]
    NotFound(&'static str),

    #[error("missing permission: {0:?}")]
    NoPermission(PermissionLevel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionLevel {
    BotAdmin,
    BotModerator,
    Admin,
    Mod,
}

impl PermissionLevel {
    pub fn text_key(self) -> &'static str {
        match self {
            PermissionLevel::BotAdmin => "botadmin.no_permission",
            PermissionLevel::BotModerator => "robyulmod.no_permission",
            PermissionLevel::Admin => "admin.no_permission",
            PermissionLevel::Mod => "mod.no_permission",
        }
    }
}

impl CommandError {
    pub fn text_key(&self) -> &'static str {
        match self {
            CommandError::TooFewArguments => "bot.arguments.too-few",
            CommandError::InvalidArguments => "bot.arguments.invalid",
            CommandError::NotFound(key) => key,
            CommandError::NoPermission(level) => level.text_key(),
        }
    }

    /// Localized reply for the invoking channel
    pub fn reply(&self) -> String {
        crate::i18n::get_text(self.text_key())
    }
}
