//! Shared data types for chatgate
//!
//! Defines the wire shapes of the proxy endpoint and the normalized
//! provider result.

use serde::{Deserialize, Deserializer, Serialize};

/// Upper bound on prompt and message length, in characters
pub const MAX_PROMPT_CHARS: usize = 2000;

/// MIME type assumed for inline images sent without a data-URI prefix
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Body of a `POST /api/ai-proxy` call
///
/// `model` and `prompt` accept any JSON type so that a wrongly typed field is
/// reported as a missing field rather than as a body parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub prompt: Option<String>,
    #[serde(
        default,
        rename = "base64Image",
        skip_serializing_if = "Option::is_none"
    )]
    pub base64_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

/// A single message in a chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// The role of a message in a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// An image supplied alongside the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    /// Accepts either bare base64 or a `data:<mime>;base64,<data>` URI.
    pub fn parse(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix("data:") {
            if let Some((header, data)) = rest.split_once(',') {
                let mime = header.split(';').next().unwrap_or_default();
                let mime_type = if mime.is_empty() {
                    DEFAULT_IMAGE_MIME.to_string()
                } else {
                    mime.to_string()
                };
                return Self {
                    mime_type,
                    data: data.to_string(),
                };
            }
        }
        Self {
            mime_type: DEFAULT_IMAGE_MIME.to_string(),
            data: raw.to_string(),
        }
    }
}

/// Input handed to an upstream provider after validation
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub prompt: String,
    pub messages: Vec<ChatMessage>,
    pub image: Option<InlineImage>,
}

impl ProviderRequest {
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// The conversation to send to chat-style upstreams. A non-blank prompt
    /// is the final user turn after any supplied history.
    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        let mut messages = self.messages.clone();
        if messages.is_empty() || !self.prompt.trim().is_empty() {
            messages.push(ChatMessage::user(self.prompt.clone()));
        }
        messages
    }

    /// Whether any user turn carries text.
    pub fn has_user_content(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.role == MessageRole::User && !m.content.trim().is_empty())
    }

    /// The single text prompt for prompt-style upstreams. Falls back to the
    /// last user message when only a message list was supplied.
    pub fn text_prompt(&self) -> &str {
        if !self.prompt.trim().is_empty() {
            return &self.prompt;
        }
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User && !m.content.trim().is_empty())
            .map(|m| m.content.as_str())
            .unwrap_or(&self.prompt)
    }
}

/// Machine-readable reason attached to an embedded error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Exhausted,
    Deprecated,
    MissingKey,
    Loading,
    Upstream,
}

/// Normalized outcome of one upstream call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderResult {
    Text {
        response: String,
    },
    Image {
        #[serde(rename = "base64Image")]
        base64_image: String,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
    },
}

impl ProviderResult {
    pub fn text(response: impl Into<String>) -> Self {
        ProviderResult::Text {
            response: response.into(),
        }
    }

    /// Wraps base64 image data, dropping any data-URI prefix.
    pub fn image(base64_image: impl Into<String>) -> Self {
        let raw = base64_image.into();
        let data = match raw.strip_prefix("data:").and_then(|r| r.split_once(',')) {
            Some((_, data)) => data.to_string(),
            None => raw,
        };
        ProviderResult::Image { base64_image: data }
    }

    pub fn error(error: impl Into<String>, code: Option<ErrorCode>) -> Self {
        ProviderResult::Error {
            error: error.into(),
            code,
        }
    }

    pub fn missing_key(key_name: &str) -> Self {
        Self::error(
            format!("{} missing. Add it to the proxy environment.", key_name),
            Some(ErrorCode::MissingKey),
        )
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ProviderResult::Error { code, .. } => *code,
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ProviderResult::Error { .. })
    }

    /// Quota exhaustion and deprecation can be served by a fallback model.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.code(),
            Some(ErrorCode::Exhausted) | Some(ErrorCode::Deprecated)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_proxy_request_parses_wire_names() {
        let req: ProxyRequest = serde_json::from_value(json!({
            "model": "gemini",
            "prompt": "describe this",
            "base64Image": "aGVsbG8=",
        }))
        .unwrap();
        assert_eq!(req.model.as_deref(), Some("gemini"));
        assert_eq!(req.prompt.as_deref(), Some("describe this"));
        assert_eq!(req.base64_image.as_deref(), Some("aGVsbG8="));
        assert!(req.messages.is_none());
    }

    #[test]
    fn test_proxy_request_non_string_prompt_is_none() {
        let req: ProxyRequest =
            serde_json::from_value(json!({"model": "kimi", "prompt": 42})).unwrap();
        assert_eq!(req.prompt, None);
    }

    #[test]
    fn test_proxy_request_with_messages() {
        let req: ProxyRequest = serde_json::from_value(json!({
            "model": "deepseek",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi"}
            ]
        }))
        .unwrap();
        let messages = req.messages.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
    }

    #[test]
    fn test_inline_image_bare_base64() {
        let image = InlineImage::parse("aGVsbG8=");
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.data, "aGVsbG8=");
    }

    #[test]
    fn test_inline_image_strips_data_uri() {
        let image = InlineImage::parse("data:image/png;base64,iVBORw0K");
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "iVBORw0K");
    }

    #[test]
    fn test_chat_messages_wraps_prompt() {
        let req = ProviderRequest::from_prompt("hello");
        assert_eq!(req.chat_messages(), vec![ChatMessage::user("hello")]);
    }

    #[test]
    fn test_chat_messages_appends_prompt_after_history() {
        let req = ProviderRequest {
            prompt: "new question".to_string(),
            messages: vec![
                ChatMessage {
                    role: MessageRole::System,
                    content: "be brief".to_string(),
                },
                ChatMessage::user("earlier turn"),
            ],
            image: None,
        };
        let messages = req.chat_messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], ChatMessage::user("earlier turn"));
        assert_eq!(messages[2], ChatMessage::user("new question"));
        assert_eq!(req.text_prompt(), "new question");
    }

    #[test]
    fn test_chat_messages_without_prompt_is_history() {
        let req = ProviderRequest {
            prompt: "  ".to_string(),
            messages: vec![ChatMessage::user("only turn")],
            image: None,
        };
        assert_eq!(req.chat_messages(), vec![ChatMessage::user("only turn")]);
    }

    #[test]
    fn test_user_content_ignores_system_and_blank_turns() {
        let mut req = ProviderRequest {
            prompt: String::new(),
            messages: vec![
                ChatMessage {
                    role: MessageRole::System,
                    content: "be brief".to_string(),
                },
                ChatMessage::user(" "),
            ],
            image: None,
        };
        assert!(!req.has_user_content());
        req.messages.push(ChatMessage::user("draw a cat"));
        assert!(req.has_user_content());
    }

    #[test]
    fn test_text_prompt_uses_last_user_message() {
        let req = ProviderRequest {
            prompt: String::new(),
            messages: vec![
                ChatMessage::user("first"),
                ChatMessage {
                    role: MessageRole::Assistant,
                    content: "ok".to_string(),
                },
                ChatMessage::user("a red fox"),
            ],
            image: None,
        };
        assert_eq!(req.text_prompt(), "a red fox");
    }

    #[test]
    fn test_result_serializes_to_wire_shapes() {
        assert_eq!(
            serde_json::to_value(ProviderResult::text("hi")).unwrap(),
            json!({"response": "hi"})
        );
        assert_eq!(
            serde_json::to_value(ProviderResult::image("AAAA")).unwrap(),
            json!({"base64Image": "AAAA"})
        );
        assert_eq!(
            serde_json::to_value(ProviderResult::error("boom", None)).unwrap(),
            json!({"error": "boom"})
        );
        assert_eq!(
            serde_json::to_value(ProviderResult::missing_key("HF_TOKEN")).unwrap(),
            json!({
                "error": "HF_TOKEN missing. Add it to the proxy environment.",
                "code": "missing_key"
            })
        );
    }

    #[test]
    fn test_image_result_drops_data_uri_prefix() {
        let result = ProviderResult::image("data:image/png;base64,AAAA");
        assert_eq!(
            result,
            ProviderResult::Image {
                base64_image: "AAAA".to_string()
            }
        );
    }

    #[test]
    fn test_recoverable_codes() {
        assert!(ProviderResult::error("q", Some(ErrorCode::Exhausted)).is_recoverable());
        assert!(ProviderResult::error("d", Some(ErrorCode::Deprecated)).is_recoverable());
        assert!(!ProviderResult::error("k", Some(ErrorCode::MissingKey)).is_recoverable());
        assert!(!ProviderResult::error("x", None).is_recoverable());
        assert!(!ProviderResult::text("fine").is_recoverable());
    }
}
