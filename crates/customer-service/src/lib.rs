//! Customer Service
//!
//! Manages customer records and their embedded addresses in MongoDB, with
//! structured, PII-redacted JSON logging of every request.
//!
//! ## Endpoints
//!
//! - `GET /healthz` - Health check
//! - `POST /v1/customers` - Create a customer
//! - `GET /v1/customers?page&limit&email` - List customers
//! - `GET /v1/customers/{id}` - Get a customer
//! - `POST /v1/customers/{id}/addresses` - Append an address
//! - `GET /v1/customers/{id}/addresses` - List a customer's addresses
//! - `GET /v1/addresses/{id}` - Get an address by id
//!
//! Errors use the envelope `{"error": {"code", "message", "correlationId"}}`.

pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod storage;

use axum::{
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use handlers::AppState;
pub use storage::{CustomerStore, MemoryStore, MongoStore};

/// Name reported by the health probe
pub const SERVICE_NAME: &str = "customer-service";

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/healthz", get(handlers::health_handler))
        .route(
            "/v1/customers",
            get(handlers::list_customers_handler).post(handlers::create_customer_handler),
        )
        .route(
            "/v1/customers/{customer_id}",
            get(handlers::get_customer_handler),
        )
        .route(
            "/v1/customers/{customer_id}/addresses",
            get(handlers::list_addresses_handler).post(handlers::create_address_handler),
        )
        .route(
            "/v1/addresses/{address_id}",
            get(handlers::get_address_handler),
        )
        .fallback(handlers::not_found_handler)
        .method_not_allowed_fallback(handlers::method_not_allowed_handler)
        .with_state(shared_state)
        // Innermost: panics become INTERNAL_ERROR inside the request context
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(middleware::from_fn(context::request_context))
        .layer(TraceLayer::new_for_http())
}
