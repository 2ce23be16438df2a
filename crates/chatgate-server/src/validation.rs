//! Request body checks run before any counter is touched

use chatgate_core::{InlineImage, ProviderRequest, ProxyError, ProxyRequest, MAX_PROMPT_CHARS};

/// A request that passed validation, ready for rate limiting and dispatch
#[derive(Debug, Clone)]
pub struct ValidRequest {
    pub model: String,
    pub request: ProviderRequest,
}

pub fn validate(body: ProxyRequest) -> Result<ValidRequest, ProxyError> {
    let mut request = ProviderRequest {
        prompt: body.prompt.unwrap_or_default(),
        messages: body.messages.unwrap_or_default(),
        image: None,
    };
    let (prompt, messages) = (&request.prompt, &request.messages);

    if prompt.trim().is_empty() && !request.has_user_content() {
        return Err(ProxyError::Validation("Prompt is required".to_string()));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ProxyError::Validation(format!(
            "Prompt exceeds {} character limit",
            MAX_PROMPT_CHARS
        )));
    }
    if messages
        .iter()
        .any(|m| m.content.chars().count() > MAX_PROMPT_CHARS)
    {
        return Err(ProxyError::Validation(format!(
            "Message exceeds {} character limit",
            MAX_PROMPT_CHARS
        )));
    }

    let model = match body.model {
        Some(model) if !model.trim().is_empty() => model.trim().to_string(),
        _ => return Err(ProxyError::Validation("Model is required".to_string())),
    };

    request.image = body
        .base64_image
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .map(InlineImage::parse);

    Ok(ValidRequest { model, request })
}
