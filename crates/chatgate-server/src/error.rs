use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatgate_core::{ProxyError, StoreError};
use serde_json::json;
use tracing::error;

/// HTTP face of a [`ProxyError`]
#[derive(Debug)]
pub struct ApiError(pub ProxyError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            ProxyError::Validation(_) | ProxyError::UnsupportedModel(_) => StatusCode::BAD_REQUEST,
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::Configuration(_)
            | ProxyError::Http(_)
            | ProxyError::Store(_)
            | ProxyError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        ApiError(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let mut response = (status, Json(json!({ "error": self.0.to_string() }))).into_response();
        if let ProxyError::RateLimited(retry_after) = self.0 {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
