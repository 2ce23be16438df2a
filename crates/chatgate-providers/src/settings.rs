//! Credentials and endpoints for the upstream providers

use std::fmt;
use std::time::Duration;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const KIMI_BASE_URL: &str = "https://api.moonshot.ai/v1";
pub const HF_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const WORKERS_AI_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Secrets, one per external provider. Absent values degrade the provider
/// to an error result instead of failing startup.
#[derive(Clone, Default)]
pub struct Credentials {
    pub gemini_key: Option<String>,
    pub deepseek_key: Option<String>,
    pub kimi_token: Option<String>,
    pub hf_token: Option<String>,
    pub cf_account_id: Option<String>,
    pub cf_api_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn state(value: &Option<String>) -> &'static str {
            if value.is_some() {
                "set"
            } else {
                "unset"
            }
        }
        f.debug_struct("Credentials")
            .field("gemini_key", &state(&self.gemini_key))
            .field("deepseek_key", &state(&self.deepseek_key))
            .field("kimi_token", &state(&self.kimi_token))
            .field("hf_token", &state(&self.hf_token))
            .field("cf_account_id", &state(&self.cf_account_id))
            .field("cf_api_token", &state(&self.cf_api_token))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub gemini: String,
    pub deepseek: String,
    pub kimi: String,
    pub huggingface: String,
    pub workers_ai: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            gemini: GEMINI_BASE_URL.to_string(),
            deepseek: DEEPSEEK_BASE_URL.to_string(),
            kimi: KIMI_BASE_URL.to_string(),
            huggingface: HF_BASE_URL.to_string(),
            workers_ai: WORKERS_AI_BASE_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Points every provider at the same base URL. Handy for local stubs.
    pub fn all(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            gemini: base.clone(),
            deepseek: base.clone(),
            kimi: base.clone(),
            huggingface: base.clone(),
            workers_ai: base,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    pub timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            endpoints: Endpoints::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}
