//! OAuth authorization-code exchange

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use vkrelay_core::{Reauthenticator, Transport};
use vkrelay_domain::constants::{DEFAULT_OAUTH_TOKEN_URL, DEFAULT_TIMEOUT_SECS};
use vkrelay_domain::{Credential, Result, TransportRequest, VkRelayError};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Exchanges an application's authorization code for an access token.
///
/// Used as the session's [`Reauthenticator`]: every expiry re-runs the
/// exchange with the same code.
pub struct AuthorizationCodeFlow {
    transport: Arc<dyn Transport>,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    code: String,
    token_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for AuthorizationCodeFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCodeFlow")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl AuthorizationCodeFlow {
    pub fn new(
        transport: Arc<dyn Transport>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            code: code.into(),
            token_url: DEFAULT_OAUTH_TOKEN_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Override the token endpoint (tests, mirrors).
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Run the exchange once.
    ///
    /// # Errors
    /// `Auth` when the endpoint answers with an `error` field or without a
    /// token, `Protocol` for an undecodable body, transport errors as-is.
    #[instrument(skip(self), fields(client_id = %self.client_id))]
    pub async fn exchange(&self) -> Result<Credential> {
        let params = vec![
            ("client_id".to_string(), self.client_id.clone()),
            ("client_secret".to_string(), self.client_secret.clone()),
            ("redirect_uri".to_string(), self.redirect_uri.clone()),
            ("code".to_string(), self.code.clone()),
        ];
        let request = TransportRequest::get(self.token_url.clone(), params, self.timeout);
        let response = self.transport.send(request).await?;

        let payload: TokenResponse = serde_json::from_str(&response.body).map_err(|err| {
            VkRelayError::Protocol(format!("token endpoint returned invalid JSON: {err}"))
        })?;

        if let Some(error) = payload.error {
            let description = payload.error_description.unwrap_or_default();
            warn!(%error, "authorization code exchange rejected");
            return Err(VkRelayError::Auth {
                reason: if description.is_empty() { error } else { format!("{error}: {description}") },
                redirect_url: Some(self.token_url.clone()),
            });
        }

        match payload.access_token.filter(|token| !token.is_empty()) {
            Some(token) => {
                info!("authorization code exchanged for access token");
                Ok(Credential::new(token))
            }
            None => Err(VkRelayError::Auth {
                reason: "token endpoint returned no access_token".into(),
                redirect_url: Some(self.token_url.clone()),
            }),
        }
    }
}

#[async_trait]
impl Reauthenticator for AuthorizationCodeFlow {
    async fn reauthenticate(&self) -> Result<Credential> {
        self.exchange().await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::http::HttpTransport;

    fn flow(server: &MockServer, code: &str) -> AuthorizationCodeFlow {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new().expect("transport"));
        AuthorizationCodeFlow::new(transport, "6000", "app-secret", "https://example.test/cb", code)
            .with_token_url(format!("{}/access_token", server.uri()))
    }

    #[tokio::test]
    async fn test_exchange_returns_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/access_token"))
            .and(query_param("client_id", "6000"))
            .and(query_param("client_secret", "app-secret"))
            .and(query_param("redirect_uri", "https://example.test/cb"))
            .and(query_param("code", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"access_token":"fresh","expires_in":86400,"user_id":1}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let credential = flow(&server, "abc").reauthenticate().await.expect("token");
        assert_eq!(credential.expose(), "fresh");
    }

    #[tokio::test]
    async fn test_error_body_becomes_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/access_token"))
            .respond_with(ResponseTemplate::new(401).set_body_string(
                r#"{"error":"invalid_grant","error_description":"Code is invalid or expired."}"#,
            ))
            .mount(&server)
            .await;

        let flow = flow(&server, "");
        match flow.exchange().await {
            Err(VkRelayError::Auth { reason, redirect_url }) => {
                assert!(reason.starts_with("invalid_grant"));
                assert_eq!(redirect_url.as_deref(), Some(flow.token_url()));
            }
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_body_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = flow(&server, "abc").exchange().await.unwrap_err();
        assert!(matches!(err, VkRelayError::Protocol(_)));
    }
}
