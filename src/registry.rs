//! The set of plugins the bot runs, and which command belongs to which of them.

use crate::{
    context::Context,
    log_internal,
    plugin::{Callbacks, Plugin},
};
use anyhow::{anyhow, Result};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Built, nothing initialized yet
    Registered,
    /// Every plugin's `init` succeeded
    Initialized,
    /// Receiving events
    Active,
    /// Every plugin's `uninit` ran
    Uninitialized,
}

pub struct Registry {
    plugins: Vec<Arc<dyn Plugin>>,
    /// Command keyword to index into `plugins`
    commands: HashMap<&'static str, usize>,
    lifecycle: Mutex<Lifecycle>,
}

impl Registry {
    /// Index every plugin's commands.  On collisions the plugin registered first keeps the
    /// keyword.
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        let mut commands: HashMap<&'static str, usize> = HashMap::new();
        for (index, plugin) in plugins.iter().enumerate() {
            for &command in plugin.commands() {
                match commands.get(command) {
                    Some(&owner) if owner != index => {
                        tracing::warn!(
                            "Command `{}` of plugin {} is shadowed by plugin {}",
                            command,
                            plugin.name(),
                            plugins[owner].name()
                        );
                    }
                    Some(_) => {}
                    None => {
                        commands.insert(command, index);
                    }
                }
            }
        }

        Self {
            plugins,
            commands,
            lifecycle: Mutex::new(Lifecycle::Registered),
        }
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Plugin handling `keyword`
    pub fn lookup(&self, keyword: &str) -> Option<&Arc<dyn Plugin>> {
        self.commands.get(keyword).map(|&index| &self.plugins[index])
    }

    pub fn is_command(&self, keyword: &str) -> bool {
        self.commands.contains_key(keyword)
    }

    /// Plugins which implement `callback`
    pub fn with_callback(&self, callback: Callbacks) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .filter(move |plugin| plugin.callbacks().contains(callback))
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock().await
    }

    /// Initialize every plugin, in registration order.  Only the first call does anything, so
    /// reconnecting to the gateway never initializes a plugin twice.
    pub async fn init_all(&self, ctx: &Context) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if *lifecycle != Lifecycle::Registered {
            return Ok(());
        }

        for plugin in &self.plugins {
            plugin
                .init(ctx)
                .await
                .map_err(|e| anyhow!("Could not initialize plugin {}: {:#}", plugin.name(), e))?;
        }

        *lifecycle = Lifecycle::Initialized;
        log_internal!("Initialized {} plugins", self.plugins.len());
        Ok(())
    }

    /// Start accepting events.  Plugins must be initialized.
    pub async fn activate(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Initialized | Lifecycle::Active => {
                *lifecycle = Lifecycle::Active;
                Ok(())
            }
            other => Err(anyhow!("Cannot activate plugins in state {:?}", other)),
        }
    }

    pub async fn is_active(&self) -> bool {
        self.lifecycle().await == Lifecycle::Active
    }

    /// Uninitialize every plugin.  Failures are logged, the remaining plugins still get their
    /// turn.
    pub async fn uninit_all(&self, ctx: &Context) {
        let mut lifecycle = self.lifecycle.lock().await;
        if !matches!(*lifecycle, Lifecycle::Initialized | Lifecycle::Active) {
            return;
        }

        for plugin in &self.plugins {
            if let Err(e) = plugin.uninit(ctx).await {
                tracing::error!(plugin = plugin.name(), "Could not uninitialize: {:#}", e);
            }
        }

        *lifecycle = Lifecycle::Uninitialized;
        log_internal!("Uninitialized {} plugins", self.plugins.len());
    }
}
