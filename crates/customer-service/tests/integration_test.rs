//! Integration tests for the Customer Service API

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bson::oid::ObjectId;
use customer_common::{Address, Customer, NewCustomer};
use customer_service::{
    create_router,
    storage::{CustomerFilter, StoreError, StoreResult},
    AppState, CustomerStore, MemoryStore,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

/// Helper to create a test app over an in-memory store
fn create_test_app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        store: store.clone(),
    };
    (create_router(state), store)
}

/// Send a request and decode the JSON response body
async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    correlation_id: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = correlation_id {
        builder = builder.header("x-correlation-id", id);
    }

    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, json)
}

async fn create_customer(app: &Router, name: &str, email: &str, phone: &str) -> Value {
    let (status, json) = send(
        app,
        "POST",
        "/v1/customers",
        Some(json!({ "name": name, "email": email, "phone": phone })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", json);
    json
}

async fn create_address(app: &Router, customer_id: &str, line1: &str) -> Value {
    let (status, json) = send(
        app,
        "POST",
        &format!("/v1/customers/{}/addresses", customer_id),
        Some(json!({ "line1": line1, "city": "Pune", "pincode": "411001" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", json);
    json
}

fn assert_error(json: &Value, code: &str) {
    assert_eq!(json["error"]["code"], code, "unexpected body: {}", json);
    assert!(json["error"]["message"].is_string());
}

#[tokio::test]
async fn test_health_check() {
    let (app, _store) = create_test_app();

    let (status, json) = send(&app, "GET", "/healthz", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "customer-service");
}

#[tokio::test]
async fn test_create_customer() {
    let (app, store) = create_test_app();

    let json = create_customer(&app, "Alice", "alice@example.com", "555-0100").await;

    let id = json["id"].as_str().unwrap();
    assert_eq!(id.len(), 24);
    assert!(ObjectId::parse_str(id).is_ok());
    assert_eq!(json["name"], "Alice");
    assert_eq!(json["email"], "alice@example.com");
    assert_eq!(json["phone"], "555-0100");
    assert_eq!(json["addresses"], json!([]));
    assert!(json["created_at"].as_str().unwrap().starts_with("20"));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_create_customer_missing_fields() {
    let (app, store) = create_test_app();

    let (status, json) = send(
        &app,
        "POST",
        "/v1/customers",
        Some(json!({ "name": "Alice", "email": "alice@example.com" })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&json, "BAD_REQUEST");
    assert_eq!(json["error"]["message"], "Name, email, and phone are required");
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_create_customer_malformed_body() {
    let (app, _store) = create_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/v1/customers")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_error(&json, "BAD_REQUEST");
}

#[tokio::test]
async fn test_duplicate_email_or_phone_conflicts() {
    let (app, store) = create_test_app();
    create_customer(&app, "Alice", "alice@example.com", "555-0100").await;

    let (status, json) = send(
        &app,
        "POST",
        "/v1/customers",
        Some(json!({ "name": "Other", "email": "alice@example.com", "phone": "555-0199" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_error(&json, "CONFLICT");

    let (status, json) = send(
        &app,
        "POST",
        "/v1/customers",
        Some(json!({ "name": "Other", "email": "other@example.com", "phone": "555-0100" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_error(&json, "CONFLICT");

    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_list_customers_pagination() {
    let (app, _store) = create_test_app();
    for i in 0..5 {
        create_customer(
            &app,
            &format!("User {}", i),
            &format!("user{}@example.com", i),
            &format!("555-010{}", i),
        )
        .await;
    }

    let (status, json) = send(&app, "GET", "/v1/customers?page=2&limit=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["page"], 2);
    assert_eq!(json["limit"], 2);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["email"], "user2@example.com");
    assert_eq!(data[1]["email"], "user3@example.com");

    let (status, json) = send(&app, "GET", "/v1/customers", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["page"], 1);
    assert_eq!(json["limit"], 20);
    assert_eq!(json["data"].as_array().unwrap().len(), 5);

    let (status, json) = send(&app, "GET", "/v1/customers?page=9&limit=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], json!([]));
}

#[tokio::test]
async fn test_list_customers_email_filter_is_case_insensitive() {
    let (app, _store) = create_test_app();
    create_customer(&app, "Alice", "alice@example.com", "555-0100").await;
    create_customer(&app, "Bob", "bob@example.org", "555-0101").await;

    let (status, json) = send(&app, "GET", "/v1/customers?email=ALICE", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["email"], "alice@example.com");

    // Pattern metacharacters match literally
    let (_, json) = send(&app, "GET", "/v1/customers?email=.org", None, None).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let (_, json) = send(&app, "GET", "/v1/customers?email=.*", None, None).await;
    assert_eq!(json["data"], json!([]));
}

#[tokio::test]
async fn test_list_customers_invalid_pagination() {
    let (app, _store) = create_test_app();

    for uri in [
        "/v1/customers?page=0",
        "/v1/customers?limit=0",
        "/v1/customers?limit=101",
        "/v1/customers?page=abc",
    ] {
        let (status, json) = send(&app, "GET", uri, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_error(&json, "BAD_REQUEST");
    }
}

#[tokio::test]
async fn test_get_customer() {
    let (app, _store) = create_test_app();
    let created = create_customer(&app, "Alice", "alice@example.com", "555-0100").await;
    let id = created["id"].as_str().unwrap();

    let uri = format!("/v1/customers/{}", id);
    let (status, first) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, created);

    let (_, second) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_get_customer_not_found() {
    let (app, _store) = create_test_app();

    let uri = format!("/v1/customers/{}", ObjectId::new().to_hex());
    let (status, json) = send(&app, "GET", &uri, None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error(&json, "NOT_FOUND");
    assert_eq!(json["error"]["message"], "Customer not found");
}

#[tokio::test]
async fn test_malformed_ids_are_rejected() {
    let (app, _store) = create_test_app();

    let cases = [
        ("GET", "/v1/customers/not-an-id", None),
        ("GET", "/v1/customers/123/addresses", None),
        (
            "POST",
            "/v1/customers/zzzzzzzzzzzzzzzzzzzzzzzz/addresses",
            Some(json!({ "line1": "1 Main St", "city": "Pune", "pincode": "411001" })),
        ),
        ("GET", "/v1/addresses/xyz", None),
    ];

    for (method, uri, body) in cases {
        let (status, json) = send(&app, method, uri, body, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", method, uri);
        assert_error(&json, "BAD_REQUEST");
    }
}

#[tokio::test]
async fn test_create_and_list_addresses() {
    let (app, _store) = create_test_app();
    let customer = create_customer(&app, "Alice", "alice@example.com", "555-0100").await;
    let customer_id = customer["id"].as_str().unwrap();

    let first = create_address(&app, customer_id, "1 Main St").await;
    assert_eq!(first["line1"], "1 Main St");
    assert_eq!(first["city"], "Pune");
    assert_eq!(first["pincode"], "411001");
    assert!(first["area"].is_null());
    assert!(ObjectId::parse_str(first["id"].as_str().unwrap()).is_ok());

    let second = create_address(&app, customer_id, "2 Side Rd").await;
    assert_ne!(first["id"], second["id"]);

    let uri = format!("/v1/customers/{}/addresses", customer_id);
    let (status, json) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([first, second]));

    let (_, customer) = send(&app, "GET", &format!("/v1/customers/{}", customer_id), None, None).await;
    assert_eq!(customer["addresses"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_address_missing_fields() {
    let (app, _store) = create_test_app();
    let customer = create_customer(&app, "Alice", "alice@example.com", "555-0100").await;
    let uri = format!("/v1/customers/{}/addresses", customer["id"].as_str().unwrap());

    let (status, json) = send(&app, "POST", &uri, Some(json!({ "line1": "1 Main St" })), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "line1, city, and pincode are required");
}

#[tokio::test]
async fn test_create_address_for_missing_customer() {
    let (app, store) = create_test_app();
    create_customer(&app, "Alice", "alice@example.com", "555-0100").await;

    let uri = format!("/v1/customers/{}/addresses", ObjectId::new().to_hex());
    let (status, json) = send(
        &app,
        "POST",
        &uri,
        Some(json!({ "line1": "1 Main St", "city": "Pune", "pincode": "411001" })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["message"], "Customer not found");
    assert_eq!(store.len().await, 1);

    let (_, list) = send(&app, "GET", "/v1/customers", None, None).await;
    assert_eq!(list["data"][0]["addresses"], json!([]));
}

#[tokio::test]
async fn test_list_addresses_for_missing_customer() {
    let (app, _store) = create_test_app();

    let uri = format!("/v1/customers/{}/addresses", ObjectId::new().to_hex());
    let (status, json) = send(&app, "GET", &uri, None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error(&json, "NOT_FOUND");
}

#[tokio::test]
async fn test_get_address_across_customers() {
    let (app, _store) = create_test_app();
    let alice = create_customer(&app, "Alice", "alice@example.com", "555-0100").await;
    let bob = create_customer(&app, "Bob", "bob@example.com", "555-0101").await;

    create_address(&app, alice["id"].as_str().unwrap(), "1 Main St").await;
    let target = create_address(&app, bob["id"].as_str().unwrap(), "9 Hill Rd").await;

    let uri = format!("/v1/addresses/{}", target["id"].as_str().unwrap());
    let (status, json) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, target);

    let uri = format!("/v1/addresses/{}", ObjectId::new().to_hex());
    let (status, json) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["message"], "Address not found");
}

#[tokio::test]
async fn test_unknown_route() {
    let (app, _store) = create_test_app();

    let (status, json) = send(&app, "GET", "/v2/nowhere", None, Some("cid-404")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        json,
        json!({
            "error": {
                "code": "NOT_FOUND",
                "message": "The requested resource was not found",
                "correlationId": "cid-404"
            }
        })
    );
}

#[tokio::test]
async fn test_unsupported_method_uses_envelope() {
    let (app, _store) = create_test_app();

    let (status, json) = send(&app, "DELETE", "/v1/customers", None, Some("cid-405")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json["error"]["code"], "METHOD_NOT_ALLOWED");
    assert_eq!(json["error"]["correlationId"], "cid-405");

    let uri = format!("/v1/addresses/{}", ObjectId::new().to_hex());
    let (status, json) = send(&app, "PUT", &uri, None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_error(&json, "METHOD_NOT_ALLOWED");
}

#[tokio::test]
async fn test_undecodable_id_is_malformed() {
    let (app, _store) = create_test_app();

    for uri in [
        "/v1/customers/%FF",
        "/v1/customers/%FF/addresses",
        "/v1/addresses/%FF",
    ] {
        let (status, json) = send(&app, "GET", uri, None, Some("cid-utf8")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_error(&json, "BAD_REQUEST");
        assert_eq!(json["error"]["correlationId"], "cid-utf8");
    }
}

#[tokio::test]
async fn test_page_beyond_addressable_range_is_rejected() {
    let (app, _store) = create_test_app();

    let (status, json) = send(
        &app,
        "GET",
        "/v1/customers?page=9223372036854775807&limit=100",
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&json, "BAD_REQUEST");
}

#[tokio::test]
async fn test_error_envelope_correlation_id() {
    let (app, _store) = create_test_app();
    let uri = format!("/v1/customers/{}", ObjectId::new().to_hex());

    let (_, json) = send(&app, "GET", &uri, None, Some("abc-123")).await;
    assert_eq!(json["error"]["correlationId"], "abc-123");

    let (_, json) = send(&app, "GET", &uri, None, None).await;
    assert!(json["error"]["correlationId"].is_null());
    assert!(json["error"].as_object().unwrap().contains_key("correlationId"));
}

/// Store whose backend is always unavailable
struct FailingStore;

#[async_trait]
impl CustomerStore for FailingStore {
    async fn insert_customer(&self, _customer: NewCustomer) -> StoreResult<Customer> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn find_customer(&self, _id: &ObjectId) -> StoreResult<Option<Customer>> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn list_customers(
        &self,
        _filter: &CustomerFilter,
        _skip: u64,
        _limit: i64,
    ) -> StoreResult<Vec<Customer>> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn push_address(&self, _customer_id: &ObjectId, _address: &Address) -> StoreResult<bool> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn find_addresses(&self, _customer_id: &ObjectId) -> StoreResult<Option<Vec<Address>>> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn find_address(&self, _address_id: &ObjectId) -> StoreResult<Option<Address>> {
        panic!("store exploded")
    }
}

#[tokio::test]
async fn test_database_error_is_not_leaked() {
    let app = create_router(AppState::new(FailingStore));

    let (status, json) = send(&app, "GET", "/v1/customers", None, Some("db-1")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json,
        json!({
            "error": {
                "code": "DATABASE_ERROR",
                "message": "A database error occurred",
                "correlationId": "db-1"
            }
        })
    );
}

#[tokio::test]
async fn test_panic_becomes_internal_error() {
    let app = create_router(AppState::new(FailingStore));

    let uri = format!("/v1/addresses/{}", ObjectId::new().to_hex());
    let (status, json) = send(&app, "GET", &uri, None, Some("boom-1")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"]["message"], "An unexpected error occurred");
    assert_eq!(json["error"]["correlationId"], "boom-1");
    assert!(!json.to_string().contains("exploded"));
}
