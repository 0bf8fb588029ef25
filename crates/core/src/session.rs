//! Request dispatcher
//!
//! A [`Session`] owns the credential and turns `(method, arguments)` into
//! a form-encoded `POST {base}/method/{method}`. Two server errors are
//! recovered locally, each at most once per call:
//!
//! - `CAPTCHA_NEEDED` (14): the challenge solver is asked for an answer
//!   and the call is re-sent with `captcha_key` / `captcha_sid` added.
//! - `AUTH_EXPIRED` (5): the re-authenticator produces a new credential,
//!   which replaces the stored one, and the call is re-sent.
//!
//! A repeat of the same condition on the retried call is returned to the
//! caller. Every other remote error is returned untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use vkrelay_domain::constants::{
    PARAM_ACCESS_TOKEN, PARAM_CAPTCHA_KEY, PARAM_CAPTCHA_SID, PARAM_VERSION,
};
use vkrelay_domain::types::transport::encode_form;
use vkrelay_domain::{
    ApiConfig, Challenge, Credential, FormParams, Params, ResponseEnvelope, Result,
    TransportRequest, TransportResponse, VkRelayError,
};

use crate::ports::{
    ChallengeSolver, NoReauthentication, Reauthenticator, RejectChallenges, Transport,
};

/// Endpoint and protocol settings of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Base URL without the `/method` suffix
    pub base_url: String,
    /// Value of the `v` parameter sent with every call
    pub version: String,
    /// Timeout for calls that do not set their own
    pub timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&ApiConfig::default())
    }
}

impl From<&ApiConfig> for SessionSettings {
    fn from(config: &ApiConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            version: config.version.clone(),
            timeout: config.timeout(),
        }
    }
}

impl SessionSettings {
    /// URL of a method endpoint
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/method/{}", self.base_url.trim_end_matches('/'), method)
    }
}

/// Authenticated dispatcher for remote method calls
pub struct Session {
    transport: Arc<dyn Transport>,
    credential: RwLock<Option<Credential>>,
    settings: SessionSettings,
    solver: Arc<dyn ChallengeSolver>,
    reauthenticator: Arc<dyn Reauthenticator>,
    cancellation_token: CancellationToken,
    closed: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("settings", &self.settings)
            .field("credential", &*self.credential.read())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create an anonymous session that surfaces captchas and auth expiry.
    pub fn new(transport: Arc<dyn Transport>, settings: SessionSettings) -> Self {
        Self {
            transport,
            credential: RwLock::new(None),
            settings,
            solver: Arc::new(RejectChallenges),
            reauthenticator: Arc::new(NoReauthentication),
            cancellation_token: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_credential(self, credential: impl Into<Credential>) -> Self {
        self.set_credential(Some(credential.into()));
        self
    }

    pub fn with_challenge_solver(mut self, solver: Arc<dyn ChallengeSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_reauthenticator(mut self, reauthenticator: Arc<dyn Reauthenticator>) -> Self {
        self.reauthenticator = reauthenticator;
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Current credential, if any
    pub fn credential(&self) -> Option<Credential> {
        self.credential.read().clone()
    }

    /// Replace the stored credential; readers see the old or the new value.
    pub fn set_credential(&self, credential: Option<Credential>) {
        *self.credential.write() = credential.filter(|token| !token.is_empty());
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Call `method` and return the `response` payload.
    ///
    /// # Errors
    ///
    /// - `Remote` for application errors other than 5 and 14
    /// - `ChallengeRequired` when a captcha cannot be solved, or reappears
    ///   after the solved retry
    /// - `Auth` when re-authentication fails, or the new credential is
    ///   rejected as well
    /// - `Closed`, `Timeout`, `Network`, `Protocol` from the exchange itself
    #[instrument(skip(self, arguments), fields(method = %method))]
    pub async fn send(
        &self,
        method: &str,
        arguments: Params,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let envelope = self.send_envelope(method, arguments, timeout).await?;
        envelope.response.ok_or_else(|| {
            VkRelayError::Protocol(format!("{method}: envelope has neither response nor error"))
        })
    }

    /// Like [`send`](Self::send), but return the whole successful envelope.
    ///
    /// The execute pool needs `execute_errors`, which sit next to
    /// `response`.
    pub async fn send_envelope(
        &self,
        method: &str,
        arguments: Params,
        timeout: Option<Duration>,
    ) -> Result<ResponseEnvelope> {
        let mut arguments = arguments;
        let mut challenge_retried = false;
        let mut auth_retried = false;

        loop {
            let mut envelope = self.request_envelope(method, &arguments, timeout).await?;

            let Some(error) = envelope.error.take() else {
                return Ok(envelope);
            };

            if error.is_captcha_needed() {
                let challenge = error.challenge().unwrap_or_else(|| Challenge {
                    url: String::new(),
                    id: String::new(),
                });
                if challenge_retried {
                    warn!(challenge_id = %challenge.id, "captcha repeated after solved retry");
                    return Err(challenge_required(&challenge));
                }
                challenge_retried = true;

                info!(challenge_id = %challenge.id, "captcha needed, asking solver");
                let solution = self.solver.solve(&challenge).await.map_err(|err| {
                    warn!(error = %err, "challenge solver failed");
                    challenge_required(&challenge)
                })?;
                arguments.insert(PARAM_CAPTCHA_KEY.to_string(), Value::String(solution));
                arguments.insert(PARAM_CAPTCHA_SID.to_string(), Value::String(challenge.id));
                continue;
            }

            if error.is_auth_expired() {
                if auth_retried {
                    warn!(code = error.code, "credential rejected after re-authentication");
                    return Err(VkRelayError::auth(error.message));
                }
                auth_retried = true;

                info!("credential expired, re-authenticating");
                let credential = self.reauthenticate().await?;
                self.set_credential(Some(credential));
                continue;
            }

            debug!(code = error.code, "remote error");
            return Err(VkRelayError::Remote(error));
        }
    }

    /// One attempt: send and decode, without interpreting the error field.
    async fn request_envelope(
        &self,
        method: &str,
        arguments: &Params,
        timeout: Option<Duration>,
    ) -> Result<ResponseEnvelope> {
        let request = TransportRequest::post(
            self.settings.method_url(method),
            self.build_params(arguments),
            timeout.unwrap_or(self.settings.timeout),
        );
        let response = self.exchange(request).await?;
        decode_envelope(method, &response)
    }

    /// Send a raw request through the session's transport.
    ///
    /// Fails with `Closed` if the session is (or gets) closed. The request
    /// timeout is enforced by the transport, so time spent waiting for a
    /// rate-limit permit does not count against it.
    pub async fn exchange(&self, request: TransportRequest) -> Result<TransportResponse> {
        if self.is_closed() {
            return Err(VkRelayError::Closed);
        }

        tokio::select! {
            _ = self.cancellation_token.cancelled() => Err(VkRelayError::Closed),
            result = self.transport.send(request) => result,
        }
    }

    /// Close the session: in-flight calls fail with `Closed` and the
    /// transport releases its resources. Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancellation_token.cancel();
        self.transport.close().await;
        debug!("session closed");
    }

    /// Fresh parameter list for one call: arguments, version, credential.
    fn build_params(&self, arguments: &Params) -> FormParams {
        let mut params = encode_form(arguments);
        params.push((PARAM_VERSION.to_string(), self.settings.version.clone()));
        if let Some(credential) = self.credential.read().as_ref() {
            params.push((PARAM_ACCESS_TOKEN.to_string(), credential.expose().to_string()));
        }
        params
    }

    async fn reauthenticate(&self) -> Result<Credential> {
        match self.reauthenticator.reauthenticate().await {
            Ok(credential) if credential.is_empty() => {
                Err(VkRelayError::auth("re-authentication returned an empty credential"))
            }
            Ok(credential) => Ok(credential),
            Err(
                err @ (VkRelayError::Auth { .. }
                | VkRelayError::ChallengeRequired { .. }
                | VkRelayError::Closed),
            ) => Err(err),
            Err(err) => Err(VkRelayError::auth(err.to_string())),
        }
    }
}

/// Cancel in-flight work if the session is dropped without `close`
impl Drop for Session {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            self.cancellation_token.cancel();
        }
    }
}

fn challenge_required(challenge: &Challenge) -> VkRelayError {
    VkRelayError::ChallengeRequired {
        challenge_url: challenge.url.clone(),
        challenge_id: challenge.id.clone(),
    }
}

fn decode_envelope(method: &str, response: &TransportResponse) -> Result<ResponseEnvelope> {
    serde_json::from_str(&response.body).map_err(|err| {
        VkRelayError::Protocol(format!(
            "{method}: undecodable response (HTTP {}): {err}",
            response.status
        ))
    })
}
