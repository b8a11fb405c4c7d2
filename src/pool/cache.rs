use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

// Ordered-set members are unique by sort key and read back ascending.
#[async_trait]
pub trait SwapCache: Send + Sync {
    async fn get(&self, kind: &str, key: &str) -> Result<Option<Value>>;

    async fn set(&self, kind: &str, key: &str, value: Value, ttl: Duration) -> Result<()>;

    async fn remove(&self, kind: &str, key: &str) -> Result<()>;

    async fn add_to_ordered_set(
        &self,
        kind: &str,
        key: &str,
        sort_key: &str,
        value: Value,
        ttl: Duration,
    ) -> Result<()>;

    async fn get_ordered_set(&self, kind: &str, key: &str) -> Result<Vec<Value>>;
}
