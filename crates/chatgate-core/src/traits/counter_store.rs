use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// A keyed integer counter with per-key expiry.
///
/// `get` and `put` are the minimal primitives. Backends that can do better
/// override `check_and_increment` with an atomic version.
#[cfg_attr(any(test, feature = "test-mocks"), mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    async fn put(&self, key: &str, value: u64, ttl: Duration) -> Result<(), StoreError>;

    /// Increments `key` and resets its expiry to `ttl` unless the counter
    /// already reached `limit`. Returns whether the increment happened.
    async fn check_and_increment(
        &self,
        key: &str,
        limit: u64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let count = self.get(key).await?.unwrap_or(0);
        if count >= limit {
            return Ok(false);
        }
        self.put(key, count + 1, ttl).await?;
        Ok(true)
    }
}
