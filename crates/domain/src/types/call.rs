//! Remote call description

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::PARAM_TIMEOUT;
use crate::errors::{Result, VkRelayError};

/// Named call arguments, in the service's JSON value model.
pub type Params = serde_json::Map<String, Value>;

/// A single remote method invocation.
///
/// `method` is the dotted name (`"users.get"`); `timeout` overrides the
/// session default for this call only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub method: String,
    pub arguments: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl Call {
    pub fn new(method: impl Into<String>, arguments: Params) -> Self {
        Self { method: method.into(), arguments, timeout: None }
    }

    /// Build a call from user-supplied arguments, pulling out the reserved
    /// `timeout` argument (seconds, integer or fractional).
    ///
    /// # Errors
    /// Returns `VkRelayError::InvalidInput` if `timeout` is present but is not
    /// a positive finite number.
    pub fn from_arguments(method: impl Into<String>, mut arguments: Params) -> Result<Self> {
        let timeout = match arguments.remove(PARAM_TIMEOUT) {
            None | Some(Value::Null) => None,
            Some(Value::Number(secs)) => {
                let secs = secs.as_f64().unwrap_or(f64::NAN);
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(VkRelayError::InvalidInput(format!(
                        "timeout must be a positive number of seconds, got {secs}"
                    )));
                }
                Some(Duration::try_from_secs_f64(secs).map_err(|err| {
                    VkRelayError::InvalidInput(format!("timeout of {secs} seconds is out of range: {err}"))
                })?)
            }
            Some(other) => {
                return Err(VkRelayError::InvalidInput(format!(
                    "timeout must be a number of seconds, got {other}"
                )))
            }
        };

        Ok(Self { method: method.into(), arguments, timeout })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::params;

    #[test]
    fn test_timeout_is_extracted() {
        let call = Call::from_arguments("users.get", params! { "user_ids" => 1, "timeout" => 3 })
            .unwrap();
        assert_eq!(call.timeout, Some(Duration::from_secs(3)));
        assert!(!call.arguments.contains_key("timeout"));
        assert_eq!(call.arguments["user_ids"], json!(1));
    }

    #[test]
    fn test_fractional_timeout() {
        let call = Call::from_arguments("users.get", params! { "timeout" => 0.5 }).unwrap();
        assert_eq!(call.timeout, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let err = Call::from_arguments("users.get", params! { "timeout" => "soon" }).unwrap_err();
        assert!(matches!(err, VkRelayError::InvalidInput(_)));

        let err = Call::from_arguments("users.get", params! { "timeout" => -1 }).unwrap_err();
        assert!(matches!(err, VkRelayError::InvalidInput(_)));
    }

    #[test]
    fn test_out_of_range_timeout_rejected() {
        let err = Call::from_arguments("users.get", params! { "timeout" => 1e20 }).unwrap_err();
        assert!(matches!(err, VkRelayError::InvalidInput(_)));
    }

    #[test]
    fn test_missing_timeout() {
        let call = Call::from_arguments("status.get", Params::new()).unwrap();
        assert_eq!(call.timeout, None);
        assert_eq!(call.method, "status.get");
    }
}
