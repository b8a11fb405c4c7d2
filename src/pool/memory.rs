use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::cache::SwapCache;
use crate::error::Result;

type CacheKey = (String, String);

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

#[derive(Debug)]
struct OrderedSet {
    members: BTreeMap<String, Value>,
    expires_at: Instant,
}

/// Process-local cache. Expired entries are hidden on read and dropped on
/// the next write to the same key.
#[derive(Debug, Default)]
pub struct MemoryCache {
    values: RwLock<HashMap<CacheKey, Entry>>,
    sets: RwLock<HashMap<CacheKey, OrderedSet>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cache_key(kind: &str, key: &str) -> CacheKey {
    (kind.to_string(), key.to_string())
}

#[async_trait]
impl SwapCache for MemoryCache {
    async fn get(&self, kind: &str, key: &str) -> Result<Option<Value>> {
        let values = self.values.read().await;
        let now = Instant::now();
        Ok(values
            .get(&cache_key(kind, key))
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, kind: &str, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let mut values = self.values.write().await;
        values.insert(
            cache_key(kind, key),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn remove(&self, kind: &str, key: &str) -> Result<()> {
        let key = cache_key(kind, key);
        self.values.write().await.remove(&key);
        self.sets.write().await.remove(&key);
        Ok(())
    }

    async fn add_to_ordered_set(
        &self,
        kind: &str,
        key: &str,
        sort_key: &str,
        value: Value,
        ttl: Duration,
    ) -> Result<()> {
        let mut sets = self.sets.write().await;
        let now = Instant::now();
        let set = sets.entry(cache_key(kind, key)).or_insert_with(|| OrderedSet {
            members: BTreeMap::new(),
            expires_at: now,
        });
        if set.expires_at <= now {
            set.members.clear();
        }
        set.members.insert(sort_key.to_string(), value);
        set.expires_at = now + ttl;
        Ok(())
    }

    async fn get_ordered_set(&self, kind: &str, key: &str) -> Result<Vec<Value>> {
        let sets = self.sets.read().await;
        let now = Instant::now();
        Ok(sets
            .get(&cache_key(kind, key))
            .filter(|set| set.expires_at > now)
            .map(|set| set.members.values().cloned().collect())
            .unwrap_or_default())
    }
}
