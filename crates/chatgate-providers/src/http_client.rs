use std::time::Duration;

use bytes::Bytes;
use chatgate_core::ProxyError;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

/// Shared HTTP client for every upstream call
#[derive(Clone)]
pub struct HttpCaller {
    client: Client,
}

/// Raw upstream reply, before provider-specific normalization
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamReply {
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// JSON body if it parses, otherwise `None`. Used on error paths where
    /// upstreams sometimes answer with plain text or HTML.
    pub fn json_lenient(&self) -> Option<Value> {
        self.json().ok()
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"))
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }

    pub fn status_text(&self) -> String {
        match self.status.canonical_reason() {
            Some(reason) => format!("{} {}", self.status.as_u16(), reason),
            None => self.status.as_u16().to_string(),
        }
    }
}

impl HttpCaller {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// POSTs `body` as JSON. Non-2xx statuses are returned, not raised, so
    /// providers can map them to embedded errors.
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &Value,
    ) -> Result<UpstreamReply, ProxyError> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        debug!(
            "Upstream replied {} ({} bytes, {:?})",
            status,
            body.len(),
            content_type
        );

        Ok(UpstreamReply {
            status,
            content_type,
            body,
        })
    }
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
