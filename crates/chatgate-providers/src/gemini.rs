use async_trait::async_trait;
use chatgate_core::{ErrorCode, MessageRole, ProviderRequest, ProviderResult, ProxyError};
use serde_json::{json, Value};
use tracing::debug;

use crate::classify::classify;
use crate::http_client::{HttpCaller, UpstreamReply};
use crate::provider::{OutputKind, Provider, Tier};

pub const GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const GEMINI_KEY: &str = "GEMINI_KEY";

/// Google Gemini `generateContent`. The only text route that accepts an
/// inline image.
#[derive(Clone)]
pub struct Gemini {
    http: HttpCaller,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl Gemini {
    pub fn new(http: HttpCaller, api_key: Option<String>, base_url: &str) -> Self {
        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: GEMINI_MODEL.to_string(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    pub(crate) fn build_body(request: &ProviderRequest) -> Value {
        let mut system: Vec<String> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for message in request.chat_messages() {
            let role = match message.role {
                MessageRole::System => {
                    system.push(message.content);
                    continue;
                }
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            contents.push(json!({
                "role": role,
                "parts": [{ "text": message.content }]
            }));
        }

        if let Some(ref image) = request.image {
            let inline = json!({
                "inlineData": { "mimeType": image.mime_type, "data": image.data }
            });
            match contents.iter().rposition(|c| c["role"] == "user") {
                Some(index) => {
                    if let Some(parts) = contents[index]["parts"].as_array_mut() {
                        parts.push(inline);
                    }
                }
                None => contents.push(json!({ "role": "user", "parts": [inline] })),
            }
        }

        let mut body = json!({ "contents": contents });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n") }] });
        }
        body
    }

    pub(crate) fn normalize(reply: &UpstreamReply) -> Result<ProviderResult, ProxyError> {
        let data = match reply.json() {
            Ok(data) => data,
            Err(e) if reply.status.is_success() => return Err(e.into()),
            Err(_) => {
                let message = format!("Gemini API Error: {}", reply.status_text());
                let code = classify(reply.status, None, &message);
                return Ok(ProviderResult::error(message, Some(code)));
            }
        };

        if let Some(error) = data.get("error") {
            let message = error["message"].as_str().unwrap_or("Unknown Gemini error");
            let code = classify(reply.status, error["status"].as_str(), message);
            return Ok(ProviderResult::error(message, Some(code)));
        }

        if !reply.status.is_success() {
            let message = format!("Gemini API Error: {}", reply.status_text());
            let code = classify(reply.status, None, &message);
            return Ok(ProviderResult::error(message, Some(code)));
        }

        let text = data["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            if let Some(reason) = data["promptFeedback"]["blockReason"].as_str() {
                return Ok(ProviderResult::error(
                    format!("Prompt blocked by Gemini: {}", reason),
                    Some(ErrorCode::Upstream),
                ));
            }
            return Ok(ProviderResult::text("No response."));
        }
        Ok(ProviderResult::text(text))
    }
}

#[async_trait]
impl Provider for Gemini {
    fn name(&self) -> &str {
        "gemini"
    }

    fn tier(&self) -> Tier {
        Tier::Paid
    }

    fn output(&self) -> OutputKind {
        OutputKind::Text
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResult, ProxyError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(ProviderResult::missing_key(GEMINI_KEY));
        };

        let body = Self::build_body(request);
        debug!(
            "Calling Gemini model {} (image: {})",
            self.model,
            request.image.is_some()
        );
        let reply = self
            .http
            .post_json(&self.url(), &[("x-goog-api-key", api_key.to_string())], &body)
            .await?;
        Self::normalize(&reply)
    }
}
