//! Decoded reply of a successful call.

use serde_json::Value;

/// Wraps the decoded JSON body.
///
/// The accessors read the platform's usual envelope fields
/// (`code`, `type`, `message`, `request_id`, `data`) and return `None` when a
/// field is absent; the body itself is not validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    body: Value,
}

impl Response {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    /// The `code` field as text. Numeric codes are rendered in decimal.
    pub fn code(&self) -> Option<String> {
        match self.body.get("code")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// True when the platform reported code `"0"`.
    pub fn is_success(&self) -> bool {
        self.code().as_deref() == Some("0")
    }

    pub fn error_type(&self) -> Option<&str> {
        self.body.get("type").and_then(Value::as_str)
    }

    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.body.get("request_id").and_then(Value::as_str)
    }

    pub fn data(&self) -> Option<&Value> {
        self.body.get("data")
    }
}
