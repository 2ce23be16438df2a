//! Provider dispatch with single-shot fallback
//!
//! A request is sent to exactly one route. When that route is a paid
//! upstream and its answer says the quota is gone or the model was retired,
//! the same request is re-sent once to the designated free route and that
//! answer is returned instead.

use chatgate_core::{ProviderRequest, ProviderResult, ProxyError};
use tracing::{info, warn};

use crate::provider::{OutputKind, Tier};
use crate::router::{ModelRouter, Route};

pub const DEFAULT_FALLBACK_MODEL: &str = "cf-llama-daily";

/// The outcome of a dispatch, with the route that actually produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub result: ProviderResult,
    pub served_by: String,
    pub fallback_used: bool,
}

#[derive(Clone)]
pub struct Dispatcher {
    router: ModelRouter,
    fallback: Option<String>,
}

impl Dispatcher {
    /// Uses [`DEFAULT_FALLBACK_MODEL`] when the router has it.
    pub fn new(router: ModelRouter) -> Self {
        let fallback = router
            .resolve(DEFAULT_FALLBACK_MODEL)
            .map(|_| DEFAULT_FALLBACK_MODEL.to_string());
        Self { router, fallback }
    }

    /// Fails unless `model` is a free text route.
    pub fn with_fallback(mut self, model: &str) -> Result<Self, ProxyError> {
        let route = self.router.resolve(model).ok_or_else(|| {
            ProxyError::Configuration(format!("Fallback model '{}' is not registered", model))
        })?;
        if route.tier() != Tier::Free || route.output() != OutputKind::Text {
            return Err(ProxyError::Configuration(format!(
                "Fallback model '{}' must be a free text model",
                model
            )));
        }
        self.fallback = Some(model.to_string());
        Ok(self)
    }

    pub fn without_fallback(mut self) -> Self {
        self.fallback = None;
        self
    }

    pub fn fallback_model(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn resolve(&self, model: &str) -> Result<&Route, ProxyError> {
        self.router
            .resolve(model)
            .ok_or_else(|| ProxyError::UnsupportedModel(model.to_string()))
    }

    pub async fn dispatch(
        &self,
        model: &str,
        request: &ProviderRequest,
    ) -> Result<Dispatch, ProxyError> {
        let route = self.resolve(model)?;
        route.provider.require_binding()?;

        let result = route.provider.invoke(request).await?;

        match self.fallback_route(route, &result) {
            Some(fallback) => {
                warn!(
                    "{} ({}) failed with {:?}, falling back to {} ({})",
                    route.model,
                    route.provider.name(),
                    result.code(),
                    fallback.model,
                    fallback.provider.name()
                );
                let fallback_result = fallback.provider.invoke(request).await?;
                if fallback_result.is_error() {
                    warn!(
                        "Fallback {} ({}) also failed",
                        fallback.model,
                        fallback.provider.name()
                    );
                }
                Ok(Dispatch {
                    result: fallback_result,
                    served_by: fallback.model.clone(),
                    fallback_used: true,
                })
            }
            None => {
                if result.is_error() {
                    info!(
                        "{} ({}) returned an error result: {:?}",
                        route.model,
                        route.provider.name(),
                        result.code()
                    );
                }
                Ok(Dispatch {
                    result,
                    served_by: route.model.clone(),
                    fallback_used: false,
                })
            }
        }
    }

    fn fallback_route(&self, route: &Route, result: &ProviderResult) -> Option<&Route> {
        if route.tier() != Tier::Paid || !result.is_recoverable() {
            return None;
        }
        let fallback = self.fallback.as_deref()?;
        if fallback == route.model {
            return None;
        }
        self.router.resolve(fallback)
    }
}
