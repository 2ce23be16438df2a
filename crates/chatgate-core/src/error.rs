//! Error handling for chatgate
//!
//! Defines the error taxonomy shared by the providers and the HTTP surface.
//! Upstream failures are *not* represented here: a provider that answered
//! with an error is a successful call carrying `ProviderResult::Error`.

use thiserror::Error;

/// The main error type for chatgate
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("{0}")]
    Validation(String),

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Rate limit exceeded. Please wait {0} seconds.")]
    RateLimited(u64),

    #[error("{0}")]
    Configuration(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limit store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid upstream response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures of a [`CounterStore`](crate::traits::CounterStore) backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Unexpected reply from counter script: {0}")]
    UnexpectedReply(String),
}
