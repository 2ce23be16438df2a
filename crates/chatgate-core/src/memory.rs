//! In-process counter store
//!
//! Used when no Redis URL is configured. Counters live for the lifetime of
//! the process and are not shared between instances.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::StoreError;
use crate::traits::CounterStore;

const SWEEP_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_count(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) -> u64 {
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => entry.count,
            Some(_) => {
                entries.remove(key);
                0
            }
            None => 0,
        }
    }

    fn store(entries: &mut HashMap<String, Entry>, key: &str, count: u64, ttl: Duration) {
        let now = Instant::now();
        if entries.len() >= SWEEP_THRESHOLD {
            entries.retain(|_, e| e.expires_at > now);
        }
        entries.insert(
            key.to_string(),
            Entry {
                count,
                expires_at: now + ttl,
            },
        );
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let mut entries = self.entries.lock();
        let count = Self::live_count(&mut entries, key, Instant::now());
        Ok((count > 0).then_some(count))
    }

    async fn put(&self, key: &str, value: u64, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        Self::store(&mut entries, key, value, ttl);
        Ok(())
    }

    async fn check_and_increment(
        &self,
        key: &str,
        limit: u64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        let count = Self::live_count(&mut entries, key, Instant::now());
        if count >= limit {
            return Ok(false);
        }
        Self::store(&mut entries, key, count + 1, ttl);
        Ok(true)
    }
}
