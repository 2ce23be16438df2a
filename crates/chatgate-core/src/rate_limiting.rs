//! Rate limiting utilities for chatgate
//!
//! Fixed-window request counting per client address and model, on top of a
//! pluggable [`CounterStore`].

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::StoreError;
use crate::traits::CounterStore;

pub const DEFAULT_LIMIT: u64 = 10;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct RateLimiter {
    store: Option<Arc<dyn CounterStore>>,
    limit: u64,
    window: Duration,
}

impl RateLimiter {
    /// Without a store every request is allowed.
    pub fn new(store: Option<Arc<dyn CounterStore>>) -> Self {
        Self {
            store,
            limit: DEFAULT_LIMIT,
            window: DEFAULT_WINDOW,
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn key(client: &str, model: &str) -> String {
        format!("ratelimit:{}:{}", client, model)
    }

    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<bool, StoreError> {
        match self.store {
            Some(ref store) => {
                let allowed = store.check_and_increment(key, limit, window).await?;
                if !allowed {
                    debug!("Rate limit reached for {}", key);
                }
                Ok(allowed)
            }
            None => Ok(true),
        }
    }

    /// Applies the configured policy to one `(client, model)` pair.
    pub async fn check(&self, client: &str, model: &str) -> Result<bool, StoreError> {
        self.check_rate_limit(&Self::key(client, model), self.limit, self.window)
            .await
    }
}
