use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chatgate_core::{ErrorCode, ProviderRequest, ProviderResult, ProxyError};
use serde_json::{json, Value};

use crate::classify::classify;
use crate::http_client::{bearer, HttpCaller, UpstreamReply};
use crate::provider::{OutputKind, Provider, Tier};

pub const LLAMA_DAILY_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";
pub const LLAMA_SPEED_MODEL: &str = "@cf/meta/llama-3.2-3b-instruct";
pub const DEEPSEEK_DISTILL_MODEL: &str = "@cf/deepseek-ai/deepseek-r1-distill-qwen-32b";
pub const FLUX_SCHNELL_MODEL: &str = "@cf/black-forest-labs/flux-1-schnell";

pub const FLUX_GUIDANCE_SCALE: f64 = 7.5;
pub const FLUX_NUM_STEPS: u32 = 4;

pub const BINDING_MISSING: &str = "AI binding not found. Set CF_ACCOUNT_ID and CF_API_TOKEN.";

/// Workers AI error codes that mean the free daily allocation is used up.
const ALLOCATION_EXHAUSTED_CODES: &[i64] = &[3036, 3040];

/// Account and token for the edge runtime's REST surface.
#[derive(Clone)]
pub struct EdgeBinding {
    pub account_id: String,
    pub api_token: String,
}

impl EdgeBinding {
    pub fn from_parts(account_id: Option<String>, api_token: Option<String>) -> Option<Self> {
        match (account_id, api_token) {
            (Some(account_id), Some(api_token)) => Some(Self {
                account_id,
                api_token,
            }),
            _ => None,
        }
    }
}

/// A built-in model of the Cloudflare Workers AI runtime.
#[derive(Clone)]
pub struct WorkersAi {
    http: HttpCaller,
    binding: Option<EdgeBinding>,
    base_url: String,
    model_id: String,
    output: OutputKind,
}

impl WorkersAi {
    pub fn text(
        http: HttpCaller,
        binding: Option<EdgeBinding>,
        base_url: &str,
        model_id: &str,
    ) -> Self {
        Self {
            http,
            binding,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_id: model_id.to_string(),
            output: OutputKind::Text,
        }
    }

    pub fn image(
        http: HttpCaller,
        binding: Option<EdgeBinding>,
        base_url: &str,
        model_id: &str,
    ) -> Self {
        Self {
            output: OutputKind::Image,
            ..Self::text(http, binding, base_url, model_id)
        }
    }

    fn url(&self, binding: &EdgeBinding) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.base_url, binding.account_id, self.model_id
        )
    }

    pub(crate) fn build_body(&self, request: &ProviderRequest) -> Value {
        match self.output {
            OutputKind::Image => json!({
                "prompt": request.text_prompt(),
                "guidance_scale": FLUX_GUIDANCE_SCALE,
                "num_steps": FLUX_NUM_STEPS,
            }),
            OutputKind::Text if !request.messages.is_empty() => {
                let messages: Vec<_> = request
                    .chat_messages()
                    .iter()
                    .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
                    .collect();
                json!({ "messages": messages })
            }
            OutputKind::Text => json!({ "prompt": request.prompt }),
        }
    }

    pub(crate) fn normalize(
        output: OutputKind,
        reply: &UpstreamReply,
    ) -> Result<ProviderResult, ProxyError> {
        if reply.status.is_success() && reply.is_image() {
            return Ok(ProviderResult::image(STANDARD.encode(&reply.body)));
        }

        let data = match reply.json() {
            Ok(data) => data,
            Err(e) if reply.status.is_success() => return Err(e.into()),
            Err(_) => {
                let message = format!("Workers AI Error: {}", reply.status_text());
                let code = classify(reply.status, None, &message);
                return Ok(ProviderResult::error(message, Some(code)));
            }
        };

        let success = data["success"].as_bool().unwrap_or(reply.status.is_success());
        if !success || !reply.status.is_success() {
            let first = &data["errors"][0];
            let message = first["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Workers AI Error: {}", reply.status_text()));
            let code = match first["code"].as_i64() {
                Some(c) if ALLOCATION_EXHAUSTED_CODES.contains(&c) => ErrorCode::Exhausted,
                _ => classify(reply.status, None, &message),
            };
            return Ok(ProviderResult::error(message, Some(code)));
        }

        let result = &data["result"];
        match output {
            OutputKind::Image => match result["image"].as_str() {
                Some(image) => Ok(ProviderResult::image(image)),
                None => Ok(ProviderResult::error(
                    "Workers AI returned no image.",
                    Some(ErrorCode::Upstream),
                )),
            },
            OutputKind::Text => {
                let text = result["response"]
                    .as_str()
                    .or_else(|| result.as_str())
                    .map(str::to_string);
                match text {
                    Some(text) => Ok(ProviderResult::text(text)),
                    None if result.is_null() => Ok(ProviderResult::error(
                        "Workers AI returned no result.",
                        Some(ErrorCode::Upstream),
                    )),
                    None => Ok(ProviderResult::text(result.to_string())),
                }
            }
        }
    }
}

#[async_trait]
impl Provider for WorkersAi {
    fn name(&self) -> &str {
        &self.model_id
    }

    fn tier(&self) -> Tier {
        Tier::Free
    }

    fn output(&self) -> OutputKind {
        self.output
    }

    fn require_binding(&self) -> Result<(), ProxyError> {
        match self.binding {
            Some(_) => Ok(()),
            None => Err(ProxyError::Configuration(BINDING_MISSING.to_string())),
        }
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResult, ProxyError> {
        let Some(ref binding) = self.binding else {
            return Ok(ProviderResult::error(
                BINDING_MISSING,
                Some(ErrorCode::MissingKey),
            ));
        };

        let body = self.build_body(request);
        let reply = self
            .http
            .post_json(
                &self.url(binding),
                &[("Authorization", bearer(&binding.api_token))],
                &body,
            )
            .await?;
        Self::normalize(self.output, &reply)
    }
}
