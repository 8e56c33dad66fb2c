//! Per-guild settings, cached in memory and backed by the document store.

use crate::permissions::ModulePermissionEntry;
use crate::store::{Store, TypedStore};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serenity::all::{ChannelId, GuildId, RoleId};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};

pub const COLLECTION: &str = "guild_settings";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: GuildId,
    pub prefix: String,
    #[serde(default)]
    pub admin_role_ids: Vec<RoleId>,
    #[serde(default)]
    pub mod_role_ids: Vec<RoleId>,
    #[serde(default)]
    pub module_permissions: Vec<ModulePermissionEntry>,
    #[serde(default)]
    pub eventlog_channel_id: Option<ChannelId>,
}

impl GuildSettings {
    pub fn new(guild_id: GuildId, prefix: impl Into<String>) -> Self {
        Self {
            guild_id,
            prefix: prefix.into(),
            admin_role_ids: Vec::new(),
            mod_role_ids: Vec::new(),
            module_permissions: Vec::new(),
            eventlog_channel_id: None,
        }
    }
}

fn filter(guild_id: GuildId) -> serde_json::Value {
    json!({ "guild_id": guild_id })
}

/// Exactly one settings record per guild, created on first access.
pub struct GuildSettingsCache {
    store: Arc<dyn Store>,
    default_prefix: String,
    cache: RwLock<HashMap<GuildId, GuildSettings>>,
    locks: Mutex<HashMap<GuildId, Arc<Mutex<()>>>>,
}

impl GuildSettingsCache {
    pub fn new(store: Arc<dyn Store>, default_prefix: impl Into<String>) -> Self {
        Self {
            store,
            default_prefix: default_prefix.into(),
            cache: RwLock::new(HashMap::new()),
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

    pub async fn get(&self, guild_id: GuildId) -> Result<GuildSettings> {
        if let Some(settings) = self.cache.read().await.get(&guild_id) {
            return Ok(settings.clone());
        }

        let lock = self.lock_for(guild_id).await;
        let _guard = lock.lock().await;
        self.load_or_create(guild_id).await
    }

    /// Must be called with the guild's lock held
    async fn load_or_create(&self, guild_id: GuildId) -> Result<GuildSettings> {
        // Someone else may have filled the cache while we waited for the lock.
        if let Some(settings) = self.cache.read().await.get(&guild_id) {
            return Ok(settings.clone());
        }

        let settings = match self
            .store
            .find_one_as::<GuildSettings>(COLLECTION, &filter(guild_id))
            .await?
        {
            Some(settings) => settings,
            None => {
                let settings = GuildSettings::new(guild_id, self.default_prefix.clone());
                self.store
                    .upsert_as(COLLECTION, &filter(guild_id), &settings)
                    .await?;
                settings
            }
        };

        self.cache.write().await.insert(guild_id, settings.clone());
        Ok(settings)
    }

    /// Store `settings`, replacing whatever was there
    pub async fn set(&self, settings: GuildSettings) -> Result<()> {
        let lock = self.lock_for(settings.guild_id).await;
        let _guard = lock.lock().await;
        self.write(settings).await
    }

    async fn write(&self, settings: GuildSettings) -> Result<()> {
        self.store
            .upsert_as(COLLECTION, &filter(settings.guild_id), &settings)
            .await?;
        self.cache
            .write()
            .await
            .insert(settings.guild_id, settings);
        Ok(())
    }

    /// Read-modify-write under the guild's lock, so concurrent updates don't lose each other
    pub async fn update<F>(&self, guild_id: GuildId, f: F) -> Result<GuildSettings>
    where
        F: FnOnce(&mut GuildSettings) + Send,
    {
        let lock = self.lock_for(guild_id).await;
        let _guard = lock.lock().await;
        let mut settings = self.load_or_create(guild_id).await?;
        f(&mut settings);
        self.write(settings.clone()).await?;
        Ok(settings)
    }

    pub async fn prefix(&self, guild_id: GuildId) -> Result<String> {
        Ok(self.get(guild_id).await?.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn cache() -> (Arc<MemoryStore>, Arc<GuildSettingsCache>) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(GuildSettingsCache::new(store.clone(), "%"));
        (store, cache)
    }

    #[tokio::test]
    async fn first_access_creates_defaults_once() {
        let (store, cache) = cache();
        let guild = GuildId::new(1);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get(guild).await.unwrap() })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().prefix, "%");
        }

        let records = store
            .find_all(COLLECTION, &json!({}))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn set_is_last_write_wins_and_persisted() {
        let (store, cache) = cache();
        let guild = GuildId::new(2);

        cache.set(GuildSettings::new(guild, "!")).await.unwrap();
        cache.set(GuildSettings::new(guild, "?")).await.unwrap();
        assert_eq!(cache.prefix(guild).await.unwrap(), "?");

        // A fresh cache over the same store sees the persisted record.
        let reloaded = GuildSettingsCache::new(store.clone(), "%");
        assert_eq!(reloaded.prefix(guild).await.unwrap(), "?");
        assert_eq!(store.find_all(COLLECTION, &json!({})).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_updates_are_not_lost() {
        let (_store, cache) = cache();
        let guild = GuildId::new(3);

        let handles: Vec<_> = (1..=10u64)
            .map(|n| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .update(guild, |s| s.mod_role_ids.push(RoleId::new(n)))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.get(guild).await.unwrap().mod_role_ids.len(), 10);
    }
}
