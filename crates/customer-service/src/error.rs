//! Translation of domain errors into the HTTP error envelope

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use customer_common::Error;
use serde::Serialize;
use std::any::Any;
use tracing::error;

use crate::context::current_correlation_id;
use crate::storage::StoreError;

/// Message returned for database failures
pub const DATABASE_ERROR_MESSAGE: &str = "A database error occurred";

/// Message returned for unanticipated failures
pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// API Error type
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError(err.into())
    }
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    correlation_id: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Database(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client
    fn client_message(&self) -> String {
        match &self.0 {
            err if err.is_client_safe() => err.to_string(),
            Error::Database(_) => DATABASE_ERROR_MESSAGE.to_string(),
            _ => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.0.code();

        match &self.0 {
            Error::Internal(e) => error!(
                code,
                status = status.as_u16(),
                error = ?e,
                "unhandled_exception"
            ),
            err => error!(
                code,
                status = status.as_u16(),
                error = %err,
                "api_error"
            ),
        }

        envelope_response(status, code, &self.client_message())
    }
}

/// Build the `{"error": {code, message, correlationId}}` response
pub fn envelope_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = ErrorEnvelope {
        error: ErrorBody {
            code,
            message,
            correlation_id: current_correlation_id().map(|id| id.to_string()),
        },
    };

    (status, Json(body)).into_response()
}

/// Panic handler for `CatchPanicLayer`: the panic payload is logged, never returned
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "panic with non-string payload".to_string()
    };

    ApiError(Error::Internal(anyhow::anyhow!(detail))).into_response()
}
