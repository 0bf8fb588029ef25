//! Execute batching pool
//!
//! Logical calls are registered per credential and sent in chunks through
//! the service's `execute` method, one generated script per chunk:
//!
//! ```text
//! return [API.users.get({"user_ids":1}),API.wall.get({"owner_id":1})];
//! ```
//!
//! The response array is positional. A `false` entry marks a failed call;
//! its error record is the next unread entry of `execute_errors`. Each
//! handle resolves either with its value or with its own error record, so
//! one bad call never affects its siblings. When the `execute` call itself
//! fails, every handle in that chunk gets a synthesized record carrying the
//! failure's code and message.
//!
//! Registering the same `(method, arguments)` twice under one credential
//! before a flush returns the same handle; the call is sent once.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};
use vkrelay_common::canonical_json;
use vkrelay_domain::constants::{AUTH_EXPIRED, CAPTCHA_NEEDED, EXECUTE_CALL_LIMIT, EXECUTE_METHOD};
use vkrelay_domain::{params, Credential, ExecuteError, Params, VkRelayError};

use crate::ports::Transport;
use crate::session::{Session, SessionSettings};

/// Outcome of one pooled call
pub type CallOutcome = std::result::Result<Value, ExecuteError>;

/// Handle to the result of a pooled call
///
/// Clones observe the same result.
#[derive(Debug, Clone)]
pub struct CallHandle {
    method: String,
    receiver: watch::Receiver<Option<CallOutcome>>,
}

impl CallHandle {
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The outcome, if the pool has already been flushed
    pub fn get(&self) -> Option<CallOutcome> {
        self.receiver.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.receiver.borrow().is_some()
    }

    /// Resolved successfully
    pub fn is_ok(&self) -> bool {
        matches!(*self.receiver.borrow(), Some(Ok(_)))
    }

    /// Wait until the pool resolves this call.
    ///
    /// A pool dropped outside a runtime never sends its calls; their
    /// handles resolve with an error record of code 0.
    pub async fn wait(&self) -> CallOutcome {
        let mut receiver = self.receiver.clone();
        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| Err(self.dropped()))
    }

    fn dropped(&self) -> ExecuteError {
        ExecuteError::new(self.method.clone(), 0, "pool dropped before the call was sent")
    }
}

struct PendingCall {
    method: String,
    arguments: Params,
    sender: watch::Sender<Option<CallOutcome>>,
}

impl PendingCall {
    fn script_entry(&self) -> String {
        format!("API.{}({})", self.method, Value::Object(self.arguments.clone()))
    }

    fn resolve(&self, outcome: CallOutcome) {
        // send_replace stores the value even when no handle is listening
        self.sender.send_replace(Some(outcome));
    }
}

struct CredentialGroup {
    credential: Credential,
    calls: Vec<PendingCall>,
    index: HashMap<String, usize>,
}

/// Groups logical calls into `execute` requests
pub struct ExecutePool {
    transport: Arc<dyn Transport>,
    settings: SessionSettings,
    calls_per_request: usize,
    groups: Vec<CredentialGroup>,
    group_index: HashMap<Credential, usize>,
}

impl std::fmt::Debug for ExecutePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutePool")
            .field("calls_per_request", &self.calls_per_request)
            .field("credentials", &self.groups.len())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl ExecutePool {
    pub fn new(transport: Arc<dyn Transport>, settings: SessionSettings) -> Self {
        Self {
            transport,
            settings,
            calls_per_request: EXECUTE_CALL_LIMIT,
            groups: Vec::new(),
            group_index: HashMap::new(),
        }
    }

    /// Chunk size, clamped to `1..=25`
    pub fn with_calls_per_request(mut self, calls_per_request: usize) -> Self {
        self.calls_per_request = calls_per_request.clamp(1, EXECUTE_CALL_LIMIT);
        self
    }

    pub fn calls_per_request(&self) -> usize {
        self.calls_per_request
    }

    /// Number of distinct calls waiting for the next flush
    pub fn pending(&self) -> usize {
        self.groups.iter().map(|group| group.calls.len()).sum()
    }

    /// Queue a call; identical pending calls share one handle.
    pub fn register(
        &mut self,
        method: impl Into<String>,
        credential: impl Into<Credential>,
        arguments: Params,
    ) -> CallHandle {
        let method = method.into();
        let credential = credential.into();

        let group_position = match self.group_index.get(&credential) {
            Some(position) => *position,
            None => {
                self.groups.push(CredentialGroup {
                    credential: credential.clone(),
                    calls: Vec::new(),
                    index: HashMap::new(),
                });
                let position = self.groups.len() - 1;
                self.group_index.insert(credential, position);
                position
            }
        };
        let group = &mut self.groups[group_position];

        let key = format!("{method}\u{0}{}", canonical_json(&Value::Object(arguments.clone())));
        if let Some(existing) = group.index.get(&key) {
            let call = &group.calls[*existing];
            debug!(method = %method, "duplicate call shares pending handle");
            return CallHandle { method, receiver: call.sender.subscribe() };
        }

        let (sender, receiver) = watch::channel(None);
        group.index.insert(key, group.calls.len());
        group.calls.push(PendingCall { method: method.clone(), arguments, sender });
        CallHandle { method, receiver }
    }

    /// Send every pending call and resolve its handle.
    ///
    /// Chunks of all credentials run concurrently. Returns the number of
    /// `execute` requests made. The pool is empty afterwards and can be
    /// reused.
    #[instrument(skip(self), fields(credential_groups = self.groups.len()))]
    pub async fn flush(&mut self) -> usize {
        let groups = std::mem::take(&mut self.groups);
        self.group_index.clear();
        execute_groups(Arc::clone(&self.transport), self.settings.clone(), self.calls_per_request, groups)
            .await
    }

    /// Flush and consume the pool
    pub async fn finish(mut self) -> usize {
        self.flush().await
    }
}

/// Pending calls are flushed in the background when the pool goes out of
/// scope inside a runtime.
impl Drop for ExecutePool {
    fn drop(&mut self) {
        if self.groups.is_empty() {
            return;
        }
        let groups = std::mem::take(&mut self.groups);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("flushing execute pool on drop");
                runtime.spawn(execute_groups(
                    Arc::clone(&self.transport),
                    self.settings.clone(),
                    self.calls_per_request,
                    groups,
                ));
            }
            Err(_) => warn!(
                pending = groups.iter().map(|g| g.calls.len()).sum::<usize>(),
                "execute pool dropped outside a runtime; pending calls are lost"
            ),
        }
    }
}

async fn execute_groups(
    transport: Arc<dyn Transport>,
    settings: SessionSettings,
    calls_per_request: usize,
    groups: Vec<CredentialGroup>,
) -> usize {
    let mut chunks = Vec::new();
    for group in groups {
        let session = Arc::new(
            Session::new(Arc::clone(&transport), settings.clone()).with_credential(group.credential),
        );
        let mut calls = group.calls.into_iter().peekable();
        while calls.peek().is_some() {
            let chunk: Vec<PendingCall> = calls.by_ref().take(calls_per_request).collect();
            chunks.push(execute_chunk(Arc::clone(&session), chunk));
        }
    }

    let sent = chunks.len();
    debug!(chunks = sent, "sending execute chunks");
    join_all(chunks).await;
    sent
}

async fn execute_chunk(session: Arc<Session>, chunk: Vec<PendingCall>) {
    let entries: Vec<String> = chunk.iter().map(PendingCall::script_entry).collect();
    let code = format!("return [{}];", entries.join(","));

    let envelope = match session.send_envelope(EXECUTE_METHOD, params! { "code" => code }, None).await {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(error = %err, calls = chunk.len(), "execute chunk failed");
            fail_chunk(&chunk, &err);
            return;
        }
    };

    let results = match envelope.response {
        Some(Value::Array(results)) => results,
        other => {
            let err = VkRelayError::Protocol(format!("execute returned {other:?} instead of an array"));
            warn!(error = %err, "execute chunk failed");
            fail_chunk(&chunk, &err);
            return;
        }
    };

    let mut errors = envelope.execute_errors.into_iter();
    let mut results = results.into_iter();
    for call in &chunk {
        let outcome = match results.next() {
            Some(Value::Bool(false)) => Err(errors.next().unwrap_or_else(|| {
                ExecuteError::new(call.method.clone(), 0, "execute reported a failure without an error record")
            })),
            Some(value) => Ok(value),
            None => Err(ExecuteError::new(call.method.clone(), 0, "execute returned too few results")),
        };
        call.resolve(outcome);
    }
}

fn fail_chunk(chunk: &[PendingCall], err: &VkRelayError) {
    let code = match err {
        VkRelayError::Remote(remote) => remote.code,
        VkRelayError::Auth { .. } => AUTH_EXPIRED,
        VkRelayError::ChallengeRequired { .. } => CAPTCHA_NEEDED,
        _ => 0,
    };
    let message = match err {
        VkRelayError::Remote(remote) => remote.message.clone(),
        other => other.to_string(),
    };
    for call in chunk {
        call.resolve(Err(ExecuteError::new(call.method.clone(), code, message.clone())));
    }
}
