//! Process configuration, read from the environment (and `.env`)

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use chatgate_core::rate_limiting::{DEFAULT_LIMIT, DEFAULT_WINDOW};
use chatgate_core::ProxyError;
use chatgate_providers::settings::DEFAULT_TIMEOUT;
use chatgate_providers::{Credentials, Endpoints, ProviderSettings, DEFAULT_FALLBACK_MODEL};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8787;
/// Large enough for a 4 MB image once base64 encoded.
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    pub redis_url: Option<String>,
    pub rate_limit_requests: u64,
    pub rate_limit_window: Duration,
    pub rate_limit_disabled: bool,
    pub fallback_model: String,
    pub upstream_timeout: Duration,
    pub max_body_bytes: usize,
    pub trust_proxy_headers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            credentials: Credentials::default(),
            endpoints: Endpoints::default(),
            redis_url: None,
            rate_limit_requests: DEFAULT_LIMIT,
            rate_limit_window: DEFAULT_WINDOW,
            rate_limit_disabled: false,
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            upstream_timeout: DEFAULT_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            trust_proxy_headers: false,
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ProxyError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProxyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Config::default();

        let endpoints = Endpoints {
            gemini: var("GEMINI_BASE_URL").unwrap_or(defaults.endpoints.gemini),
            deepseek: var("DEEPSEEK_BASE_URL").unwrap_or(defaults.endpoints.deepseek),
            kimi: var("KIMI_BASE_URL").unwrap_or(defaults.endpoints.kimi),
            huggingface: var("HF_BASE_URL").unwrap_or(defaults.endpoints.huggingface),
            workers_ai: var("CF_BASE_URL").unwrap_or(defaults.endpoints.workers_ai),
        };

        Ok(Config {
            host: var("CHATGATE_HOST").unwrap_or(defaults.host),
            port: parse_or("CHATGATE_PORT", var("CHATGATE_PORT"), defaults.port)?,
            credentials: Credentials {
                gemini_key: var("GEMINI_KEY"),
                deepseek_key: var("DEEPSEEK_KEY"),
                kimi_token: var("KIMI_TOKEN"),
                hf_token: var("HF_TOKEN"),
                cf_account_id: var("CF_ACCOUNT_ID"),
                cf_api_token: var("CF_API_TOKEN"),
            },
            endpoints,
            redis_url: var("REDIS_URL"),
            rate_limit_requests: parse_or(
                "RATE_LIMIT_REQUESTS",
                var("RATE_LIMIT_REQUESTS"),
                defaults.rate_limit_requests,
            )?,
            rate_limit_window: secs_or(
                "RATE_LIMIT_WINDOW_SECS",
                var("RATE_LIMIT_WINDOW_SECS"),
                defaults.rate_limit_window,
            )?,
            rate_limit_disabled: flag("RATE_LIMIT_DISABLED", var("RATE_LIMIT_DISABLED"))?,
            fallback_model: var("FALLBACK_MODEL").unwrap_or(defaults.fallback_model),
            upstream_timeout: secs_or(
                "UPSTREAM_TIMEOUT_SECS",
                var("UPSTREAM_TIMEOUT_SECS"),
                defaults.upstream_timeout,
            )?,
            max_body_bytes: parse_or(
                "MAX_BODY_BYTES",
                var("MAX_BODY_BYTES"),
                defaults.max_body_bytes,
            )?,
            trust_proxy_headers: flag("TRUST_PROXY_HEADERS", var("TRUST_PROXY_HEADERS"))?,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ProxyError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|e| {
            ProxyError::Configuration(format!("Invalid listen address '{}': {}", addr, e))
        })
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            credentials: self.credentials.clone(),
            endpoints: self.endpoints.clone(),
            timeout: self.upstream_timeout,
        }
    }
}

fn parse_or<T>(name: &str, value: Option<String>, default: T) -> Result<T, ProxyError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e| ProxyError::Configuration(format!("Invalid {} '{}': {}", name, raw, e))),
        None => Ok(default),
    }
}

fn secs_or(name: &str, value: Option<String>, default: Duration) -> Result<Duration, ProxyError> {
    let secs = parse_or(name, value, default.as_secs())?;
    if secs == 0 {
        return Err(ProxyError::Configuration(format!(
            "{} must be at least 1 second",
            name
        )));
    }
    Ok(Duration::from_secs(secs))
}

fn flag(name: &str, value: Option<String>) -> Result<bool, ProxyError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("0") | Some("false") | Some("no") | Some("off") => Ok(false),
        Some("1") | Some("true") | Some("yes") | Some("on") => Ok(true),
        Some(other) => Err(ProxyError::Configuration(format!(
            "Invalid {} '{}': expected true or false",
            name, other
        ))),
    }
}
