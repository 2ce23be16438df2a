use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chatgate_core::{ErrorCode, ProviderRequest, ProviderResult, ProxyError};
use reqwest::StatusCode;
use serde_json::json;

use crate::classify::classify;
use crate::http_client::{bearer, HttpCaller, UpstreamReply};
use crate::provider::{OutputKind, Provider, Tier};

pub const FLUX_MODEL: &str = "black-forest-labs/FLUX.1-schnell";
pub const HF_TOKEN: &str = "HF_TOKEN";

/// Hugging Face serverless inference for text-to-image models. Success is
/// the raw image bytes; failures are small JSON objects.
#[derive(Clone)]
pub struct HuggingFaceImage {
    http: HttpCaller,
    token: Option<String>,
    base_url: String,
    model: String,
}

impl HuggingFaceImage {
    pub fn flux(http: HttpCaller, token: Option<String>, base_url: &str) -> Self {
        Self {
            http,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: FLUX_MODEL.to_string(),
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model)
    }

    pub(crate) fn normalize(reply: &UpstreamReply) -> Result<ProviderResult, ProxyError> {
        if reply.status.is_success() && !reply.is_json() {
            return Ok(ProviderResult::image(STANDARD.encode(&reply.body)));
        }

        let detail = reply.json_lenient();
        let upstream_message = detail
            .as_ref()
            .and_then(|d| d["error"].as_str())
            .map(str::to_string);

        if reply.status == StatusCode::SERVICE_UNAVAILABLE {
            let estimated = detail.as_ref().and_then(|d| d["estimated_time"].as_f64());
            if let Some(seconds) = estimated {
                return Ok(ProviderResult::error(
                    format!("Model is loading, retry in about {:.0} seconds.", seconds),
                    Some(ErrorCode::Loading),
                ));
            }
        }

        let message = match upstream_message {
            Some(ref m) => format!("Flux API Error: {}", m),
            None => format!("Flux API Error: {}", reply.status_text()),
        };
        let code = classify(reply.status, None, &message);
        Ok(ProviderResult::error(message, Some(code)))
    }
}

#[async_trait]
impl Provider for HuggingFaceImage {
    fn name(&self) -> &str {
        "flux"
    }

    fn tier(&self) -> Tier {
        Tier::Paid
    }

    fn output(&self) -> OutputKind {
        OutputKind::Image
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResult, ProxyError> {
        let Some(token) = self.token.as_deref() else {
            return Ok(ProviderResult::missing_key(HF_TOKEN));
        };

        let body = json!({ "inputs": request.text_prompt() });
        let reply = self
            .http
            .post_json(&self.url(), &[("Authorization", bearer(token))], &body)
            .await?;
        Self::normalize(&reply)
    }
}
