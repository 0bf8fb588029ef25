//! Remote error envelope and interactive challenge

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{AUTH_EXPIRED, CAPTCHA_NEEDED};

/// An application-level failure reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ErrorPayload")]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
    /// The request parameters the server echoed back with the error.
    pub params: BTreeMap<String, String>,
    /// Challenge id, present on `CAPTCHA_NEEDED` errors.
    pub captcha_sid: Option<String>,
    /// Challenge image URL, present on `CAPTCHA_NEEDED` errors.
    pub captcha_img: Option<String>,
}

impl RemoteError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            params: BTreeMap::new(),
            captcha_sid: None,
            captcha_img: None,
        }
    }

    pub fn is_captcha_needed(&self) -> bool {
        self.code == CAPTCHA_NEEDED
    }

    pub fn is_auth_expired(&self) -> bool {
        self.code == AUTH_EXPIRED
    }

    /// The challenge to solve, if this is a `CAPTCHA_NEEDED` error.
    pub fn challenge(&self) -> Option<Challenge> {
        if !self.is_captcha_needed() {
            return None;
        }
        Some(Challenge {
            url: self.captcha_img.clone().unwrap_or_default(),
            id: self.captcha_sid.clone().unwrap_or_default(),
        })
    }
}

/// Server-issued human verification step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Image to show the human.
    pub url: String,
    /// Opaque id to send back with the solution.
    pub id: String,
}

/// One `execute_errors` record: a sub-call that failed inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteError {
    #[serde(default)]
    pub method: String,
    #[serde(rename = "error_code")]
    pub code: i64,
    #[serde(rename = "error_msg", default)]
    pub message: String,
}

impl ExecuteError {
    pub fn new(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self { method: method.into(), code, message: message.into() }
    }
}

/// Decoded body of a method call: either `response` or `error`, plus the
/// per-sub-call errors that `execute` adds next to `response`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<RemoteError>,
    #[serde(default)]
    pub execute_errors: Vec<ExecuteError>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_msg: String,
    #[serde(default)]
    request_params: Vec<RequestParam>,
    #[serde(default)]
    captcha_sid: Option<Value>,
    #[serde(default)]
    captcha_img: Option<String>,
}

#[derive(Deserialize)]
struct RequestParam {
    key: String,
    #[serde(default)]
    value: Value,
}

impl From<ErrorPayload> for RemoteError {
    fn from(payload: ErrorPayload) -> Self {
        let params = payload
            .request_params
            .into_iter()
            .map(|param| (param.key, value_to_string(param.value)))
            .collect();

        Self {
            code: payload.error_code,
            message: payload.error_msg,
            params,
            captcha_sid: payload.captcha_sid.map(value_to_string),
            captcha_img: payload.captcha_img,
        }
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_error_envelope_decoding() {
        let envelope: ResponseEnvelope = serde_json::from_value(json!({
            "error": {
                "error_code": 100,
                "error_msg": "One of the parameters specified was missing or invalid",
                "request_params": [
                    {"key": "method", "value": "users.get"},
                    {"key": "user_ids", "value": 1}
                ]
            }
        }))
        .unwrap();

        let error = envelope.error.unwrap();
        assert_eq!(error.code, 100);
        assert_eq!(error.params["method"], "users.get");
        assert_eq!(error.params["user_ids"], "1");
        assert!(envelope.response.is_none());
    }

    #[test]
    fn test_captcha_challenge_extraction() {
        let error: RemoteError = serde_json::from_value(json!({
            "error_code": 14,
            "error_msg": "Captcha needed",
            "captcha_sid": 548_372_610_u64,
            "captcha_img": "https://api.vk.com/captcha.php?sid=548372610"
        }))
        .unwrap();

        let challenge = error.challenge().unwrap();
        assert_eq!(challenge.id, "548372610");
        assert!(challenge.url.ends_with("sid=548372610"));
        assert!(RemoteError::new(5, "auth").challenge().is_none());
    }

    #[test]
    fn test_execute_errors_decoding() {
        let envelope: ResponseEnvelope = serde_json::from_value(json!({
            "response": [false, [{"id": 1}]],
            "execute_errors": [
                {"method": "users.get", "error_code": 113, "error_msg": "Invalid user id"}
            ]
        }))
        .unwrap();

        assert_eq!(envelope.execute_errors, vec![ExecuteError::new("users.get", 113, "Invalid user id")]);
        assert_eq!(envelope.response.unwrap()[1][0]["id"], 1);
    }
}
