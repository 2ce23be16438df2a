use std::collections::HashMap;

use tracing::warn;

use crate::gemini::Gemini;
use crate::http_client::HttpCaller;
use crate::huggingface::HuggingFaceImage;
use crate::openai_compat::OpenAiCompatible;
use crate::provider::{OutputKind, Provider, Tier};
use crate::settings::ProviderSettings;
use crate::workers_ai::{
    EdgeBinding, WorkersAi, DEEPSEEK_DISTILL_MODEL, FLUX_SCHNELL_MODEL, LLAMA_DAILY_MODEL,
    LLAMA_SPEED_MODEL,
};

/// A model id bound to the provider that serves it
#[derive(Clone)]
pub struct Route {
    pub model: String,
    pub provider: Box<dyn Provider>,
}

impl Route {
    pub fn tier(&self) -> Tier {
        self.provider.tier()
    }

    pub fn output(&self) -> OutputKind {
        self.provider.output()
    }
}

#[derive(Clone, Default)]
pub struct ModelRouter {
    routes: HashMap<String, Route>,
}

impl ModelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, model: impl Into<String>, provider: Box<dyn Provider>) -> Self {
        let model = model.into();
        if self.routes.contains_key(&model) {
            warn!("Route '{}' registered twice, keeping the last one", model);
        }
        self.routes.insert(
            model.clone(),
            Route { model, provider },
        );
        self
    }

    /// The fixed set of models this proxy serves.
    pub fn standard(settings: &ProviderSettings, http: HttpCaller) -> Self {
        let credentials = &settings.credentials;
        let endpoints = &settings.endpoints;
        let binding = EdgeBinding::from_parts(
            credentials.cf_account_id.clone(),
            credentials.cf_api_token.clone(),
        );

        Self::new()
            .with_route(
                "gemini",
                Box::new(Gemini::new(
                    http.clone(),
                    credentials.gemini_key.clone(),
                    &endpoints.gemini,
                )),
            )
            .with_route(
                "deepseek",
                Box::new(OpenAiCompatible::deepseek(
                    http.clone(),
                    credentials.deepseek_key.clone(),
                    &endpoints.deepseek,
                )),
            )
            .with_route(
                "kimi",
                Box::new(OpenAiCompatible::kimi(
                    http.clone(),
                    credentials.kimi_token.clone(),
                    &endpoints.kimi,
                )),
            )
            .with_route(
                "flux",
                Box::new(HuggingFaceImage::flux(
                    http.clone(),
                    credentials.hf_token.clone(),
                    &endpoints.huggingface,
                )),
            )
            .with_route(
                "cf-llama-daily",
                Box::new(WorkersAi::text(
                    http.clone(),
                    binding.clone(),
                    &endpoints.workers_ai,
                    LLAMA_DAILY_MODEL,
                )),
            )
            .with_route(
                "cf-llama-speed",
                Box::new(WorkersAi::text(
                    http.clone(),
                    binding.clone(),
                    &endpoints.workers_ai,
                    LLAMA_SPEED_MODEL,
                )),
            )
            .with_route(
                "cf-deepseek",
                Box::new(WorkersAi::text(
                    http.clone(),
                    binding.clone(),
                    &endpoints.workers_ai,
                    DEEPSEEK_DISTILL_MODEL,
                )),
            )
            .with_route(
                "cf-flux",
                Box::new(WorkersAi::image(
                    http,
                    binding,
                    &endpoints.workers_ai,
                    FLUX_SCHNELL_MODEL,
                )),
            )
    }

    pub fn resolve(&self, model: &str) -> Option<&Route> {
        self.routes.get(model)
    }

    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        models.sort_unstable();
        models
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
