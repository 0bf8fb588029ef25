//! Test doubles for the core ports
//!
//! Enabled for this crate's own tests and, through the `test-utils`
//! feature, for downstream crates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use vkrelay_domain::{
    Challenge, Credential, Result, TransportRequest, TransportResponse, VkRelayError,
};

use crate::ports::{ChallengeSolver, Reauthenticator, Transport};

type Responder = dyn Fn(&TransportRequest) -> Result<TransportResponse> + Send + Sync;

enum Step {
    Respond(Result<TransportResponse>),
    Hang,
}

#[derive(Default)]
struct ScriptState {
    steps: VecDeque<Step>,
    requests: Vec<TransportRequest>,
    responder: Option<Arc<Responder>>,
}

/// Transport that replays queued responses and records every request
///
/// Queued steps are consumed in order. Once the queue is empty the
/// responder (if any) answers; otherwise the request fails with
/// `VkRelayError::Internal`. Clones share the same script.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ScriptedTransport")
            .field("queued", &state.steps.len())
            .field("recorded", &state.requests.len())
            .finish()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests the queue does not cover with `responder`
    pub fn respond_with<F>(self, responder: F) -> Self
    where
        F: Fn(&TransportRequest) -> Result<TransportResponse> + Send + Sync + 'static,
    {
        self.state.lock().responder = Some(Arc::new(responder));
        self
    }

    pub fn push(&self, response: TransportResponse) {
        self.state.lock().steps.push_back(Step::Respond(Ok(response)));
    }

    /// Queue a 200 response with a JSON body
    pub fn push_json(&self, body: Value) {
        self.push(TransportResponse::ok(body.to_string()));
    }

    pub fn push_status(&self, status: u16, body: impl Into<String>) {
        self.push(TransportResponse { status, body: body.into(), url: String::new() });
    }

    pub fn push_error(&self, error: VkRelayError) {
        self.state.lock().steps.push_back(Step::Respond(Err(error)));
    }

    /// Queue a request that never answers; it fails once its timeout passes
    pub fn push_hang(&self) {
        self.state.lock().steps.push_back(Step::Hang);
    }

    /// Every request sent so far, in order
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.state.lock().requests.clone()
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().steps.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let step = {
            let mut state = self.state.lock();
            state.requests.push(request.clone());
            match state.steps.pop_front() {
                Some(step) => step,
                None => match state.responder.clone() {
                    Some(responder) => Step::Respond(responder(&request)),
                    None => Step::Respond(Err(VkRelayError::Internal(format!(
                        "no scripted response for {}",
                        request.url
                    )))),
                },
            }
        };

        match step {
            Step::Respond(result) => result,
            Step::Hang => {
                tokio::time::sleep(request.timeout).await;
                Err(VkRelayError::Timeout(request.timeout))
            }
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Challenge solver returning a fixed answer and recording what it saw
#[derive(Debug, Default)]
pub struct FixedSolver {
    answer: String,
    seen: Mutex<Vec<Challenge>>,
}

impl FixedSolver {
    pub fn new(answer: impl Into<String>) -> Self {
        Self { answer: answer.into(), seen: Mutex::new(Vec::new()) }
    }

    pub fn seen(&self) -> Vec<Challenge> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl ChallengeSolver for FixedSolver {
    async fn solve(&self, challenge: &Challenge) -> Result<String> {
        self.seen.lock().push(challenge.clone());
        Ok(self.answer.clone())
    }
}

/// Re-authenticator handing out a fixed credential and counting calls
#[derive(Debug)]
pub struct FixedReauthenticator {
    credential: Credential,
    calls: Mutex<usize>,
}

impl FixedReauthenticator {
    pub fn new(credential: impl Into<Credential>) -> Self {
        Self { credential: credential.into(), calls: Mutex::new(0) }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Reauthenticator for FixedReauthenticator {
    async fn reauthenticate(&self) -> Result<Credential> {
        *self.calls.lock() += 1;
        Ok(self.credential.clone())
    }
}
