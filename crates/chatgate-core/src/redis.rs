//! Redis-backed counter store
//!
//! Shares rate-limit counters between every proxy instance pointed at the
//! same Redis.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::info;

use crate::error::StoreError;
use crate::traits::CounterStore;

const CHECK_AND_INCREMENT_SCRIPT: &str = r#"
local key = KEYS[1]
local limit = tonumber(ARGV[1])
local window = tonumber(ARGV[2])

local current = tonumber(redis.call('GET', key) or '0')
if current >= limit then
    return {0, current}
end

current = redis.call('INCR', key)
redis.call('EXPIRE', key, window)
return {1, current}
"#;

#[derive(Clone)]
pub struct RedisCounterStore {
    manager: ConnectionManager,
}

impl RedisCounterStore {
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        info!("Connected rate-limit counter store to Redis");
        Ok(Self { manager })
    }

    fn ttl_secs(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let mut conn = self.manager.clone();

        let value: Option<u64> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: u64, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();

        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(Self::ttl_secs(ttl))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn check_and_increment(
        &self,
        key: &str,
        limit: u64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();

        let result: Vec<i64> = redis::cmd("EVAL")
            .arg(CHECK_AND_INCREMENT_SCRIPT)
            .arg(1)
            .arg(key)
            .arg(limit)
            .arg(Self::ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;

        match result.first().copied() {
            Some(1) => Ok(true),
            Some(0) => Ok(false),
            _ => Err(StoreError::UnexpectedReply(format!("{:?}", result))),
        }
    }
}
