//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use vkrelay_domain::VkRelayError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub VkRelayError);

impl From<InfraError> for VkRelayError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<VkRelayError> for InfraError {
    fn from(value: VkRelayError) -> Self {
        InfraError(value)
    }
}

trait IntoVkRelayError {
    fn into_vkrelay(self) -> VkRelayError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → VkRelayError */
/* -------------------------------------------------------------------------- */

impl IntoVkRelayError for HttpError {
    fn into_vkrelay(self) -> VkRelayError {
        // Never echo query strings: they may carry an access token
        let url = self.url().map(|url| {
            let mut url = url.clone();
            url.set_query(None);
            url.to_string()
        });
        let target = url.map(|url| format!(" ({url})")).unwrap_or_default();

        if self.is_timeout() {
            VkRelayError::Network(format!("http request timed out{target}"))
        } else if self.is_connect() {
            VkRelayError::Network(format!("http connection failed{target}"))
        } else if self.is_decode() {
            VkRelayError::Protocol(format!("http body could not be decoded{target}"))
        } else if self.is_builder() {
            VkRelayError::InvalidInput(format!("invalid http request{target}"))
        } else if self.is_body() || self.is_request() {
            VkRelayError::Network(format!("http request failed{target}: {}", self.without_url()))
        } else {
            VkRelayError::Network(format!("http error{target}: {}", self.without_url()))
        }
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_vkrelay())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_connect_failure_maps_to_network() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = reqwest::Client::new()
            .get(format!("http://{addr}/method/users.get?access_token=secret"))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .unwrap_err();

        let converted: VkRelayError = InfraError::from(err).into();
        assert!(matches!(converted, VkRelayError::Network(_)));
        assert!(!converted.to_string().contains("secret"));
        assert!(converted.is_retryable());
    }

    #[test]
    fn test_newtype_round_trip() {
        let infra = InfraError::from(VkRelayError::Closed);
        assert!(matches!(VkRelayError::from(infra), VkRelayError::Closed));
    }
}
