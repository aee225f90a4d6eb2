//! Process-local TTL cache for computed dashboard payloads

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct DashboardCache {
    // key -> serialized payload
    entries: Arc<DashMap<String, Entry>>,
    ttl: Duration,
}

pub fn dashboard_key(cooperative_id: Uuid, year: i32) -> String {
    format!("dashboard:{}:{}", cooperative_id, year)
}

pub fn cooperative_prefix(cooperative_id: Uuid) -> String {
    format!("dashboard:{}:", cooperative_id)
}

pub const OVERVIEW_PREFIX: &str = "overview:";

pub fn overview_key(year: i32) -> String {
    format!("{}{}", OVERVIEW_PREFIX, year)
}

impl DashboardCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let hit = {
            let entry = self.entries.get(key)?;
            if entry.expires_at > Instant::now() {
                Some(entry.value.clone())
            } else {
                None
            }
        };
        match hit {
            Some(value) => serde_json::from_value(value).ok(),
            None => {
                self.entries.remove(key);
                None
            }
        }
    }

    /// Store `value` under `key` and drop every entry that has expired
    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);

        // Payloads that cannot be serialized are simply not cached
        if let Ok(value) = serde_json::to_value(value) {
            self.entries.insert(
                key.to_string(),
                Entry {
                    value,
                    expires_at: now + self.ttl,
                },
            );
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    /// Errors from `compute` are returned and nothing is cached.
    pub async fn remember<T, E, F, Fut>(&self, key: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(key) {
            tracing::debug!(key, "Dashboard cache hit");
            return Ok(hit);
        }
        let value = compute().await?;
        if !self.ttl.is_zero() {
            self.put(key, &value);
        }
        Ok(value)
    }

    pub fn forget_prefix(&self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| !k.starts_with(prefix));
        before.saturating_sub(self.entries.len())
    }

    /// Drop every cached figure that depends on a cooperative's reports
    pub fn invalidate_cooperative(&self, cooperative_id: Uuid) {
        let removed = self.forget_prefix(&cooperative_prefix(cooperative_id))
            + self.forget_prefix(OVERVIEW_PREFIX);
        tracing::debug!(%cooperative_id, removed, "Dashboard cache invalidated");
    }
}
