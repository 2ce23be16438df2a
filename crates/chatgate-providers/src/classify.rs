//! Mapping of upstream failures onto [`ErrorCode`]
//!
//! Structured signals win: the HTTP status first, then the provider's own
//! error code or type. Only when neither is conclusive is the English message
//! text searched for known phrases. Upstreams reword their messages freely,
//! so that last step is a heuristic.

use chatgate_core::ErrorCode;
use reqwest::StatusCode;

const EXHAUSTED_CODES: &[&str] = &[
    "resource_exhausted",
    "insufficient_quota",
    "exceeded_current_quota_error",
    "rate_limit_reached_error",
    "insufficient_balance",
    "quota_exceeded",
];

const DEPRECATED_CODES: &[&str] = &["model_deprecated", "deprecated", "model_decommissioned"];

const EXHAUSTED_PHRASES: &[&str] = &[
    "quota",
    "exhausted",
    "insufficient balance",
    "exceeded your monthly included credits",
    "credits",
    "rate limit",
];

const DEPRECATED_PHRASES: &[&str] = &[
    "deprecated",
    "decommissioned",
    "no longer supported",
    "no longer available",
];

pub fn classify(status: StatusCode, provider_code: Option<&str>, message: &str) -> ErrorCode {
    if let Some(code) = from_status(status) {
        return code;
    }
    if let Some(code) = provider_code.and_then(from_provider_code) {
        return code;
    }
    from_message(message).unwrap_or(ErrorCode::Upstream)
}

fn from_status(status: StatusCode) -> Option<ErrorCode> {
    match status.as_u16() {
        402 | 429 => Some(ErrorCode::Exhausted),
        410 => Some(ErrorCode::Deprecated),
        _ => None,
    }
}

fn from_provider_code(code: &str) -> Option<ErrorCode> {
    let code = code.to_ascii_lowercase();
    if EXHAUSTED_CODES.contains(&code.as_str()) {
        Some(ErrorCode::Exhausted)
    } else if DEPRECATED_CODES.contains(&code.as_str()) {
        Some(ErrorCode::Deprecated)
    } else {
        None
    }
}

fn from_message(message: &str) -> Option<ErrorCode> {
    let lower = message.to_lowercase();
    if DEPRECATED_PHRASES.iter().any(|p| lower.contains(p)) {
        Some(ErrorCode::Deprecated)
    } else if EXHAUSTED_PHRASES.iter().any(|p| lower.contains(p)) {
        Some(ErrorCode::Exhausted)
    } else {
        None
    }
}
