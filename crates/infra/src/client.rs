//! Configured client facade
//!
//! [`VkClient`] wires the pieces a typical application needs from one
//! [`ClientConfig`]: the reqwest transport, the optional permit-pool rate
//! limiter, and a [`Session`] carrying the credential and recovery
//! collaborators. Method builders, long-poll readers and execute pools all
//! share that session (or its transport).

use std::sync::Arc;

use tracing::info;
use vkrelay_common::resilience::PermitPoolConfig;
use vkrelay_core::{
    Api, ChallengeSolver, ExecutePool, LazyApi, LongPollClient, LongPollKind, LongPollSettings,
    RateLimitedTransport, Reauthenticator, Session, SessionSettings, Transport,
};
use vkrelay_domain::{ClientConfig, Credential, Result};

use crate::auth::AuthorizationCodeFlow;
use crate::http::HttpTransport;

/// Entry point bundling a session with its configuration
pub struct VkClient {
    config: ClientConfig,
    session: Arc<Session>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for VkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VkClient")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl VkClient {
    pub fn builder(config: ClientConfig) -> VkClientBuilder {
        VkClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Eager method builder: `client.api().method("users").extend("get")`.
    pub fn api(&self) -> Api {
        Api::new(self.session.clone())
    }

    /// Method builder producing deferred calls.
    pub fn lazy_api(&self) -> LazyApi {
        LazyApi::new(self.session.clone())
    }

    /// User long-poll reader using the `long_poll` config section.
    pub fn user_long_poll(&self) -> LongPollClient {
        let config = &self.config.long_poll;
        LongPollClient::new(
            self.session.clone(),
            LongPollKind::User { use_https: config.use_https },
            LongPollSettings::from(config),
        )
    }

    /// Group long-poll reader; only the wait window comes from config.
    pub fn group_long_poll(&self, group_id: i64) -> LongPollClient {
        LongPollClient::new(
            self.session.clone(),
            LongPollKind::Group { group_id },
            LongPollSettings::group().with_wait_secs(self.config.long_poll.wait_secs),
        )
    }

    /// Fresh execute pool sharing this client's (rate-limited) transport.
    pub fn execute_pool(&self) -> ExecutePool {
        ExecutePool::new(self.transport.clone(), self.session.settings().clone())
            .with_calls_per_request(self.config.pool.calls_per_request)
    }

    /// Close the session, the rate limiter and the transport.
    pub async fn close(&self) {
        self.session.close().await;
    }
}

/// Builder for [`VkClient`]
pub struct VkClientBuilder {
    config: ClientConfig,
    credential: Option<Credential>,
    transport: Option<Arc<dyn Transport>>,
    solver: Option<Arc<dyn ChallengeSolver>>,
    reauthenticator: Option<Arc<dyn Reauthenticator>>,
    authorization_code: Option<AuthorizationCodeParams>,
}

struct AuthorizationCodeParams {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    code: String,
}

impl VkClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            credential: None,
            transport: None,
            solver: None,
            reauthenticator: None,
            authorization_code: None,
        }
    }

    pub fn credential(mut self, credential: impl Into<Credential>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Replace the reqwest transport (the rate limiter still applies).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn challenge_solver(mut self, solver: Arc<dyn ChallengeSolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn reauthenticator(mut self, reauthenticator: Arc<dyn Reauthenticator>) -> Self {
        self.reauthenticator = Some(reauthenticator);
        self
    }

    /// Renew expired tokens with an [`AuthorizationCodeFlow`] over the
    /// unthrottled base transport.
    pub fn authorization_code(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        self.authorization_code = Some(AuthorizationCodeParams {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            code: code.into(),
        });
        self
    }

    /// Validate the configuration and assemble the client.
    ///
    /// Must run inside a Tokio runtime when rate limiting is enabled, since
    /// the limiter's refill task is spawned here.
    ///
    /// # Errors
    /// `VkRelayError::Config` for an invalid configuration or a missing
    /// runtime; reqwest builder failures as `InvalidInput`.
    pub fn build(self) -> Result<VkClient> {
        self.config.validate()?;

        let base: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::from_config(&self.config.http)?),
        };

        let transport: Arc<dyn Transport> = if self.config.rate_limit.enabled {
            let permits = PermitPoolConfig::new(
                self.config.rate_limit.requests_per_period,
                self.config.rate_limit.period(),
            );
            Arc::new(RateLimitedTransport::new(base.clone(), permits)?)
        } else {
            base.clone()
        };

        let settings = SessionSettings::from(&self.config.api);
        let mut session = Session::new(transport.clone(), settings);
        if let Some(credential) = self.credential {
            session = session.with_credential(credential);
        }
        if let Some(solver) = self.solver {
            session = session.with_challenge_solver(solver);
        }

        let reauthenticator = match (self.reauthenticator, self.authorization_code) {
            (Some(reauthenticator), _) => Some(reauthenticator),
            (None, Some(params)) => {
                let flow = AuthorizationCodeFlow::new(
                    base,
                    params.client_id,
                    params.client_secret,
                    params.redirect_uri,
                    params.code,
                )
                .with_timeout(self.config.api.timeout());
                Some(Arc::new(flow) as Arc<dyn Reauthenticator>)
            }
            (None, None) => None,
        };
        if let Some(reauthenticator) = reauthenticator {
            session = session.with_reauthenticator(reauthenticator);
        }

        info!(
            base_url = %self.config.api.base_url,
            version = %self.config.api.version,
            rate_limited = self.config.rate_limit.enabled,
            "vkrelay client ready"
        );

        Ok(VkClient { config: self.config, session: Arc::new(session), transport })
    }
}
