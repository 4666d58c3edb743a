//! API request handlers for customers and their addresses

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use bson::oid::ObjectId;
use chrono::{SubsecRound, Utc};
use customer_common::{Address, Customer, Error};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    error::{envelope_response, ApiError},
    models::{CreateAddressRequest, CreateCustomerRequest, ListCustomersQuery, ListCustomersResponse},
    storage::{parse_object_id, CustomerFilter, CustomerStore},
    SERVICE_NAME,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Process-wide store handle; pooled and safe for concurrent use
    pub store: Arc<dyn CustomerStore>,
}

impl AppState {
    pub fn new(store: impl CustomerStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// Path segment parsed as an ObjectId; undecodable segments are malformed ids too
fn object_id_param(
    param: Result<Path<String>, PathRejection>,
    label: &str,
) -> Result<ObjectId, ApiError> {
    match param {
        Ok(Path(raw)) => Ok(parse_object_id(&raw, label)?),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "path_rejected");
            Err(Error::validation(format!("Invalid {} format", label)).into())
        }
    }
}

/// Health probe
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME
    }))
}

/// Create a customer
pub async fn create_customer_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateCustomerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let Json(payload) = payload.map_err(|rejection| Error::validation(rejection.body_text()))?;
    let new_customer = payload.validate()?;

    let customer = state.store.insert_customer(new_customer).await?;

    info!(customer_id = %customer.id, "customer_created");
    Ok((StatusCode::CREATED, Json(customer)))
}

/// List customers, optionally filtered by email substring
pub async fn list_customers_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListCustomersQuery>, QueryRejection>,
) -> Result<Json<ListCustomersResponse>, ApiError> {
    let Query(query) = query.map_err(|rejection| Error::validation(rejection.body_text()))?;
    let pagination = query.pagination()?;

    let filter = CustomerFilter {
        email_contains: query.email_filter(),
    };

    let data = state
        .store
        .list_customers(&filter, pagination.offset(), pagination.limit)
        .await?;

    info!(
        page = pagination.page,
        limit = pagination.limit,
        count = data.len(),
        "customers_listed"
    );

    Ok(Json(ListCustomersResponse {
        page: pagination.page,
        limit: pagination.limit,
        data,
    }))
}

/// Get a customer by id
pub async fn get_customer_handler(
    State(state): State<Arc<AppState>>,
    customer_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Customer>, ApiError> {
    let id = object_id_param(customer_id, "customer_id")?;

    match state.store.find_customer(&id).await? {
        Some(customer) => Ok(Json(customer)),
        None => Err(Error::not_found("Customer not found").into()),
    }
}

/// Append an address to a customer
pub async fn create_address_handler(
    State(state): State<Arc<AppState>>,
    customer_id: Result<Path<String>, PathRejection>,
    payload: Result<Json<CreateAddressRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Address>), ApiError> {
    let id = object_id_param(customer_id, "customer_id")?;

    let Json(payload) = payload.map_err(|rejection| Error::validation(rejection.body_text()))?;
    let input = payload.validate()?;

    let address = Address::new(ObjectId::new().to_hex(), input, Utc::now().trunc_subsecs(3));

    // The push is a no-op when the customer does not exist
    if !state.store.push_address(&id, &address).await? {
        return Err(Error::not_found("Customer not found").into());
    }

    info!(customer_id = %id, address_id = %address.id, "address_created");
    Ok((StatusCode::CREATED, Json(address)))
}

/// List the addresses of a customer
pub async fn list_addresses_handler(
    State(state): State<Arc<AppState>>,
    customer_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<Address>>, ApiError> {
    let id = object_id_param(customer_id, "customer_id")?;

    match state.store.find_addresses(&id).await? {
        Some(addresses) => Ok(Json(addresses)),
        None => Err(Error::not_found("Customer not found").into()),
    }
}

/// Get an address by id, whichever customer owns it
pub async fn get_address_handler(
    State(state): State<Arc<AppState>>,
    address_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Address>, ApiError> {
    let id = object_id_param(address_id, "address_id")?;

    match state.store.find_address(&id).await? {
        Some(address) => Ok(Json(address)),
        None => Err(Error::not_found("Address not found").into()),
    }
}

/// Fallback for unknown routes
pub async fn not_found_handler(uri: Uri) -> Response {
    warn!(path = %uri.path(), "not_found");
    envelope_response(
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
        "The requested resource was not found",
    )
}

/// Fallback for known routes hit with an unsupported method
pub async fn method_not_allowed_handler(method: Method, uri: Uri) -> Response {
    warn!(method = %method, path = %uri.path(), "method_not_allowed");
    envelope_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "METHOD_NOT_ALLOWED",
        "The requested method is not allowed for this resource",
    )
}
