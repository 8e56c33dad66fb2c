//! Per-user command token buckets.
//!
//! Every command costs one key.  Keys drip back in on a fixed interval.  Users who run dry are
//! told once and then parked at -1, so the next drop only brings them to 0 and the one after
//! that refills them completely.

use crate::config::Ratelimit;
use serenity::all::UserId;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Bucket value of a user who has been told to slow down
pub const CHILL: i8 = -1;

pub struct BucketContainer {
    settings: Ratelimit,
    buckets: RwLock<HashMap<UserId, i8>>,
}

impl BucketContainer {
    pub fn new(settings: Ratelimit) -> Self {
        Self {
            settings,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Whether `user_id` may run another command.  Creates a full bucket on first sight.
    pub async fn has_keys(&self, user_id: UserId) -> bool {
        *self
            .buckets
            .write()
            .await
            .entry(user_id)
            .or_insert(self.settings.initial_fill)
            > 0
    }

    /// Take `amount` keys.  Returns false, leaving the bucket untouched, if there are not enough.
    pub async fn drain(&self, amount: i8, user_id: UserId) -> bool {
        let mut buckets = self.buckets.write().await;
        let keys = buckets
            .entry(user_id)
            .or_insert(self.settings.initial_fill);
        if amount > *keys {
            return false;
        }
        *keys -= amount;
        true
    }

    pub async fn get(&self, user_id: UserId) -> Option<i8> {
        self.buckets.read().await.get(&user_id).copied()
    }

    pub async fn set(&self, user_id: UserId, keys: i8) {
        self.buckets.write().await.insert(user_id, keys);
    }

    /// One refill round over every bucket
    pub async fn refill(&self) {
        let mut buckets = self.buckets.write().await;
        for keys in buckets.values_mut() {
            *keys = match *keys {
                CHILL => 0,
                0 => self.settings.initial_fill,
                k if k < self.settings.upper_bound => {
                    (k.saturating_add(self.settings.drop_size)).min(self.settings.upper_bound)
                }
                k => k,
            };
        }
    }

    /// Refill forever.  Meant to run under the supervisor.
    pub async fn run_refiller(&self) -> anyhow::Result<()> {
        let period = std::time::Duration::from_secs(self.settings.drop_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.refill().await;
        }
    }
}
