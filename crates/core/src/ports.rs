//! Port interfaces consumed by the session and long-poll client

use async_trait::async_trait;
use vkrelay_domain::{Challenge, Credential, Result, TransportRequest, TransportResponse, VkRelayError};

/// Performs one HTTP exchange
///
/// Implementations return the status, the decoded body and the effective
/// URL; they do not interpret the body. Non-2xx statuses are responses,
/// not errors. An exchange that outlives `request.timeout` fails with
/// `VkRelayError::Timeout`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for the full response body
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;

    /// Release sockets, background tasks and other held resources.
    ///
    /// Called once when the owning session closes.
    async fn close(&self) {}
}

/// Solves an interactive challenge (captcha) out of band
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    /// Return the solution text for the challenge image
    async fn solve(&self, challenge: &Challenge) -> Result<String>;
}

/// Obtains a fresh credential after the current one expired
#[async_trait]
pub trait Reauthenticator: Send + Sync {
    async fn reauthenticate(&self) -> Result<Credential>;
}

/// Solver used when none is configured: every challenge is surfaced
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectChallenges;

#[async_trait]
impl ChallengeSolver for RejectChallenges {
    async fn solve(&self, challenge: &Challenge) -> Result<String> {
        Err(VkRelayError::ChallengeRequired {
            challenge_url: challenge.url.clone(),
            challenge_id: challenge.id.clone(),
        })
    }
}

/// Re-authenticator for token-only sessions: an expired token is final
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReauthentication;

#[async_trait]
impl Reauthenticator for NoReauthentication {
    async fn reauthenticate(&self) -> Result<Credential> {
        Err(VkRelayError::auth("invalid_token"))
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        (**self).send(request).await
    }

    async fn close(&self) {
        (**self).close().await;
    }
}
