//! Core types, traits, and error handling for chatgate
//!
//! This crate contains the request/result data model, the error taxonomy,
//! and the rate limiter together with its counter-store backends.

pub mod error;
pub mod memory;
pub mod rate_limiting;
pub mod redis;
pub mod traits;
pub mod types;

// Re-exports for convenient access
pub use error::{ProxyError, StoreError};
pub use memory::MemoryCounterStore;
pub use rate_limiting::RateLimiter;
pub use redis::RedisCounterStore;
pub use traits::CounterStore;
pub use types::{
    ChatMessage, ErrorCode, InlineImage, MessageRole, ProviderRequest, ProviderResult,
    ProxyRequest, MAX_PROMPT_CHARS,
};
