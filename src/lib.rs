//! Robyul, a modular Discord bot.
//!
//! Features live in plugins (`plugin`), which the `registry` owns and the `dispatch` module feeds
//! with commands and gateway events.

pub mod config;
pub mod context;
pub mod discord;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod handler;
pub mod helper;
pub mod i18n;
pub mod logging;
pub mod permissions;
pub mod plugin;
pub mod ratelimit;
pub mod registry;
pub mod settings;
pub mod store;
pub mod supervisor;

#[cfg(test)]
mod testing;
