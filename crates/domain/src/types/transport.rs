//! Wire-level request/response shapes exchanged with a transport

use std::time::Duration;

use serde_json::Value;

use super::call::Params;
use crate::impl_status_conversions;

/// Form-encoded parameters, in insertion order.
pub type FormParams = Vec<(String, String)>;

/// HTTP verb used by a transport request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    /// Parameters travel in the query string.
    Get,
    /// Parameters travel form-encoded in the body.
    Post,
}

impl_status_conversions!(RequestMethod {
    Get => "get",
    Post => "post",
});

/// A single request handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: RequestMethod,
    pub url: String,
    pub params: FormParams,
    pub timeout: Duration,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>, params: FormParams, timeout: Duration) -> Self {
        Self { method: RequestMethod::Get, url: url.into(), params, timeout }
    }

    pub fn post(url: impl Into<String>, params: FormParams, timeout: Duration) -> Self {
        Self { method: RequestMethod::Post, url: url.into(), params, timeout }
    }

    /// Look up a parameter by name (first occurrence).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }
}

/// What a transport hands back: status, decoded body and the URL the
/// request finally landed on (after redirects).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    pub url: String,
}

impl TransportResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into(), url: String::new() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Encode one argument value for the form body.
///
/// Scalars are written as-is, booleans as `1`/`0`, arrays of scalars
/// comma-joined (the service's list convention) and anything nested as
/// compact JSON. `null` means "omit the argument".
pub fn encode_form_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(if *flag { "1" } else { "0" }.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(text.clone()),
        Value::Array(items) if items.iter().all(is_scalar) => {
            Some(items.iter().filter_map(encode_form_value).collect::<Vec<_>>().join(","))
        }
        nested => Some(nested.to_string()),
    }
}

/// Encode a whole argument map, dropping `null` values.
pub fn encode_form(params: &Params) -> FormParams {
    params
        .iter()
        .filter_map(|(key, value)| encode_form_value(value).map(|encoded| (key.clone(), encoded)))
        .collect()
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}
