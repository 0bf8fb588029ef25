use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, RequestBuilder};
use tracing::debug;
use vkrelay_core::Transport;
use vkrelay_domain::{HttpConfig, RequestMethod, TransportRequest, TransportResponse, VkRelayError};

use crate::errors::InfraError;

/// reqwest-backed transport with optional retry of transport failures.
///
/// GET requests carry their parameters in the query string, POST requests
/// as an `application/x-www-form-urlencoded` body. Any HTTP status is a
/// response; only connection-level failures (and 5xx when retries are
/// configured) are retried.
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("max_attempts", &self.max_attempts)
            .field("base_backoff", &self.base_backoff)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Start building a new transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, VkRelayError> {
        Self::builder().build()
    }

    /// Transport configured from the `http` config section.
    pub fn from_config(config: &HttpConfig) -> Result<Self, VkRelayError> {
        let mut builder = Self::builder()
            .max_attempts(config.max_attempts)
            .base_backoff(Duration::from_millis(config.base_backoff_ms));
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder.build()
    }

    fn prepare(&self, request: &TransportRequest) -> RequestBuilder {
        let builder = match request.method {
            RequestMethod::Get => self.client.get(&request.url).query(&request.params),
            RequestMethod::Post => self.client.post(&request.url).form(&request.params),
        };
        builder.timeout(request.timeout)
    }

    /// Execute the request with retry semantics.
    async fn execute(&self, request: &TransportRequest) -> Result<TransportResponse, VkRelayError> {
        let attempts = self.max_attempts.max(1);
        let method = request.method;
        let url = request.url.as_str();

        for attempt in 0..attempts {
            debug!(attempt = attempt + 1, %method, %url, "sending HTTP request");

            match self.prepare(request).send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt = attempt + 1, %method, %url, %status, "received HTTP response");

                    if status.is_server_error() && attempt + 1 < attempts {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    let effective_url = response.url().to_string();
                    let body = response.text().await.map_err(|err| {
                        let infra: InfraError = err.into();
                        VkRelayError::from(infra)
                    })?;

                    return Ok(TransportResponse { status: status.as_u16(), body, url: effective_url });
                }
                Err(err) => {
                    debug!(attempt = attempt + 1, %method, %url, error = %err.without_url_ref(), "HTTP request failed");

                    if attempt + 1 < attempts && should_retry_error(&err) {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    if err.is_timeout() {
                        return Err(VkRelayError::Timeout(request.timeout));
                    }
                    let infra: InfraError = err.into();
                    return Err(VkRelayError::from(infra));
                }
            }
        }

        Err(VkRelayError::Internal("http transport exhausted retries without producing a result".into()))
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = retry_number.saturating_sub(1).min(8) as u32;
        let multiplier = 1u32 << shift;
        self.base_backoff.saturating_mul(multiplier)
    }

    async fn sleep_with_backoff(&self, retry_number: usize) {
        let delay = self.backoff_delay(retry_number);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, VkRelayError> {
        self.execute(&request).await
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    connect_timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: Option<String>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_attempts: 1,
            base_backoff: Duration::from_millis(200),
            user_agent: None,
        }
    }
}

impl HttpTransportBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpTransport, VkRelayError> {
        let mut builder = ReqwestClient::builder().connect_timeout(self.connect_timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            VkRelayError::from(infra)
        })?;

        Ok(HttpTransport {
            client,
            max_attempts: self.max_attempts.max(1),
            base_backoff: self.base_backoff,
        })
    }
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

trait WithoutUrlRef {
    fn without_url_ref(&self) -> String;
}

impl WithoutUrlRef for reqwest::Error {
    /// Render the error without its URL, which may carry an access token.
    fn without_url_ref(&self) -> String {
        let rendered = self.to_string();
        match self.url() {
            Some(url) => rendered.replace(url.as_str(), "<redacted>"),
            None => rendered,
        }
    }
}
