//! chatgate HTTP service
//!
//! One endpoint, `POST /api/ai-proxy`. A request is validated, counted
//! against the `(client, model)` rate limit, dispatched to the provider
//! registered for its model and answered with the normalized result.

pub mod client;
pub mod config;
pub mod error;
pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, DefaultBodyLimit, FromRequest, Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chatgate_core::{
    CounterStore, MemoryCounterStore, ProxyError, ProxyRequest, RateLimiter, RedisCounterStore,
};
use chatgate_providers::{Dispatcher, HttpCaller, ModelRouter};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub use client::{client_address, fingerprint};
pub use config::Config;
pub use error::ApiError;
pub use validation::{validate, ValidRequest};

pub const PROXY_PATH: &str = "/api/ai-proxy";

pub static PROVIDER_HEADER: HeaderName = HeaderName::from_static("x-chatgate-provider");
pub static FALLBACK_HEADER: HeaderName = HeaderName::from_static("x-chatgate-fallback");
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Shared, read-only state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub limiter: RateLimiter,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, dispatcher: Dispatcher, limiter: RateLimiter) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            limiter,
            config: Arc::new(config),
        }
    }
}

/// Wires the provider registry and the counter store described by `config`.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> Result<(), chatgate_core::ProxyError> {
/// use chatgate_server::{app, build_state, Config};
///
/// let state = build_state(Config::from_env()?).await?;
/// let router = app(state);
/// # Ok(()) }
/// ```
pub async fn build_state(config: Config) -> Result<AppState, ProxyError> {
    let store: Option<Arc<dyn CounterStore>> = if config.rate_limit_disabled {
        warn!("Rate limiting disabled");
        None
    } else if let Some(ref url) = config.redis_url {
        Some(Arc::new(RedisCounterStore::new(url).await?))
    } else {
        info!("REDIS_URL not set, counting requests in memory");
        Some(Arc::new(MemoryCounterStore::new()))
    };

    let limiter = RateLimiter::new(store)
        .with_limit(config.rate_limit_requests)
        .with_window(config.rate_limit_window);

    let http = HttpCaller::new(config.upstream_timeout)?;
    let router = ModelRouter::standard(&config.provider_settings(), http);
    let dispatcher = Dispatcher::new(router).with_fallback(&config.fallback_model)?;

    Ok(AppState::new(config, dispatcher, limiter))
}

pub fn app(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(PROXY_PATH, post(proxy).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn method_not_allowed() -> ApiError {
    ApiError(ProxyError::MethodNotAllowed)
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}

async fn proxy(State(state): State<AppState>, request: Request) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_address(request.headers(), peer, state.config.trust_proxy_headers);
    let request_id = Uuid::new_v4();
    let span = info_span!("proxy", %request_id, client = %fingerprint(&client));

    let mut response = async move {
        let body = Json::<ProxyRequest>::from_request(request, &state).await;
        handle(&state, &client, body)
            .await
            .unwrap_or_else(IntoResponse::into_response)
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

async fn handle(
    state: &AppState,
    client: &str,
    body: Result<Json<ProxyRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        ProxyError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let valid = validate(body)?;
    state
        .dispatcher
        .resolve(&valid.model)?
        .provider
        .require_binding()?;

    if !state.limiter.check(client, &valid.model).await? {
        warn!("Rate limit hit for {}", valid.model);
        return Err(ProxyError::RateLimited(state.limiter.window().as_secs()).into());
    }

    let dispatch = state
        .dispatcher
        .dispatch(&valid.model, &valid.request)
        .await?;
    info!(
        model = %valid.model,
        served_by = %dispatch.served_by,
        fallback = dispatch.fallback_used,
        "Request served"
    );

    let mut response = (StatusCode::OK, Json(dispatch.result)).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&dispatch.served_by) {
        headers.insert(PROVIDER_HEADER.clone(), value);
    }
    headers.insert(
        FALLBACK_HEADER.clone(),
        HeaderValue::from_static(if dispatch.fallback_used { "true" } else { "false" }),
    );
    Ok(response)
}
