//! Per-request correlation context
//!
//! Each request runs inside its own `request` span (read by the log layer)
//! and its own task-local correlation scope (read by the error translator).
//! Both are tied to the request's future, so concurrent requests never see
//! each other's context.

use axum::{
    body::Body,
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use customer_common::Error;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use tracing::{field, info, span, warn, Instrument, Level};

use crate::error::ApiError;

/// Header carrying the caller's correlation ID
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Largest request body buffered for logging
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Opaque caller-supplied correlation token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

tokio::task_local! {
    static CURRENT_CORRELATION_ID: Option<CorrelationId>;
}

/// Run `future` with `correlation_id` as the current correlation ID
pub async fn scope_correlation_id<F>(correlation_id: Option<CorrelationId>, future: F) -> F::Output
where
    F: Future,
{
    CURRENT_CORRELATION_ID.scope(correlation_id, future).await
}

/// Correlation ID of the request being handled, if any
pub fn current_correlation_id() -> Option<CorrelationId> {
    CURRENT_CORRELATION_ID
        .try_with(|id| id.clone())
        .ok()
        .flatten()
}

/// Read the correlation header; absent or non-UTF-8 values count as none.
/// No ID is ever generated.
fn extract_correlation_id(headers: &HeaderMap) -> Option<CorrelationId> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(CorrelationId::from)
}

/// Request context middleware.
///
/// Binds the correlation ID, path and method for the lifetime of the request,
/// logs `request_started` with the parsed JSON body (null when absent or not
/// JSON) and `request_finished` with the response status.
pub async fn request_context(request: Request, next: Next) -> Response {
    let correlation_id = extract_correlation_id(request.headers());

    // ERROR level keeps the span enabled under any LOG_LEVEL
    let span = span!(
        Level::ERROR,
        "request",
        correlation_id = field::Empty,
        path = %request.uri().path(),
        method = %request.method(),
    );
    if let Some(id) = &correlation_id {
        span.record("correlation_id", id.as_str());
    }

    let handle = async move {
        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES).await;

        let request_body = bytes
            .as_ref()
            .ok()
            .and_then(|b| serde_json::from_slice::<Value>(b).ok())
            .unwrap_or(Value::Null);
        info!(request_body = %request_body, "request_started");

        let response = match bytes {
            Ok(bytes) => next.run(Request::from_parts(parts, Body::from(bytes))).await,
            Err(e) => {
                warn!(error = %e, "request_body_unreadable");
                ApiError::from(Error::validation(format!(
                    "Request body could not be read (limit {} bytes)",
                    MAX_BODY_BYTES
                )))
                .into_response()
            }
        };

        info!(status_code = response.status().as_u16(), "request_finished");
        response
    };

    scope_correlation_id(correlation_id, handle.instrument(span)).await
}
