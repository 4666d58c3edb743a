//! PII masking for structured log events

use serde_json::{Map, Value};

/// Replacement for masked values
pub const REDACTED: &str = "REDACTED";

/// Keys whose values never reach a log destination
pub const PII_FIELDS: [&str; 3] = ["email", "phone", "line1"];

pub const REQUEST_BODY: &str = "request_body";
pub const RESPONSE_BODY: &str = "response_body";

/// Mask PII keys inside the `request_body` and `response_body` fields.
///
/// Only top-level keys of object bodies are inspected; other shapes are left
/// untouched.
pub fn mask_pii(event: &mut Map<String, Value>) {
    for key in [REQUEST_BODY, RESPONSE_BODY] {
        if let Some(Value::Object(body)) = event.get_mut(key) {
            for field in PII_FIELDS {
                if let Some(value) = body.get_mut(field) {
                    *value = Value::String(REDACTED.to_string());
                }
            }
        }
    }
}
