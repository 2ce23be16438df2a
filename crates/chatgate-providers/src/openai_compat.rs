use async_trait::async_trait;
use chatgate_core::{ErrorCode, ProviderRequest, ProviderResult, ProxyError};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::classify::classify;
use crate::http_client::{bearer, HttpCaller, UpstreamReply};
use crate::provider::{OutputKind, Provider, Tier};

pub const DEEPSEEK_MODEL: &str = "deepseek-chat";
pub const DEEPSEEK_KEY: &str = "DEEPSEEK_KEY";
pub const KIMI_MODEL: &str = "kimi-k2-instruct";
pub const KIMI_TOKEN: &str = "KIMI_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub message: CompletionMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Any upstream speaking the OpenAI `/chat/completions` dialect with a
/// bearer token. DeepSeek and Moonshot's Kimi both do.
#[derive(Clone)]
pub struct OpenAiCompatible {
    http: HttpCaller,
    display_name: &'static str,
    key_name: &'static str,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiCompatible {
    pub fn new(
        http: HttpCaller,
        display_name: &'static str,
        key_name: &'static str,
        api_key: Option<String>,
        base_url: &str,
        model: &str,
    ) -> Self {
        Self {
            http,
            display_name,
            key_name,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn deepseek(http: HttpCaller, api_key: Option<String>, base_url: &str) -> Self {
        Self::new(http, "DeepSeek", DEEPSEEK_KEY, api_key, base_url, DEEPSEEK_MODEL)
    }

    pub fn kimi(http: HttpCaller, api_key: Option<String>, base_url: &str) -> Self {
        Self::new(http, "Kimi", KIMI_TOKEN, api_key, base_url, KIMI_MODEL)
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub(crate) fn normalize(
        display_name: &str,
        reply: &UpstreamReply,
    ) -> Result<ProviderResult, ProxyError> {
        let data = match reply.json() {
            Ok(data) => data,
            Err(e) if reply.status.is_success() => return Err(e.into()),
            Err(_) => {
                let message = format!("{} API Error: {}", display_name, reply.status_text());
                let code = classify(reply.status, None, &message);
                return Ok(ProviderResult::error(message, Some(code)));
            }
        };

        if let Some(error) = data.get("error") {
            let message = error["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{} API Error: {}", display_name, reply.status_text()));
            let provider_code = error["code"]
                .as_str()
                .filter(|c| !c.is_empty())
                .or_else(|| error["type"].as_str());
            let code = classify(reply.status, provider_code, &message);
            return Ok(ProviderResult::error(message, Some(code)));
        }

        if !reply.status.is_success() {
            let message = format!("{} API Error: {}", display_name, reply.status_text());
            let code = classify(reply.status, None, &message);
            return Ok(ProviderResult::error(message, Some(code)));
        }

        let completion: CompletionResponse = serde_json::from_value(data)?;
        match completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
        {
            Some(content) => Ok(ProviderResult::text(content)),
            None => Ok(ProviderResult::error(
                format!("No content received from {}.", display_name),
                Some(ErrorCode::Upstream),
            )),
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatible {
    fn name(&self) -> &str {
        self.display_name
    }

    fn tier(&self) -> Tier {
        Tier::Paid
    }

    fn output(&self) -> OutputKind {
        OutputKind::Text
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResult, ProxyError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(ProviderResult::missing_key(self.key_name));
        };

        let messages: Vec<_> = request
            .chat_messages()
            .into_iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let body = json!({
            "model": self.model,
            "messages": messages,
        });

        let reply = self
            .http
            .post_json(&self.url(), &[("Authorization", bearer(api_key))], &body)
            .await?;
        Self::normalize(self.display_name, &reply)
    }
}
