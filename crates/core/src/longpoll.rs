//! Long-poll client
//!
//! The client keeps a [`Cursor`] (`server`, `key`, `ts`, `pts`). With no
//! server it bootstraps through the session's `*.getLongPollServer`
//! method, then polls the server directly with `act=a_check`. Responses
//! are classified by their `failed` field:
//!
//! | `failed` | meaning            | action                                 |
//! |----------|--------------------|----------------------------------------|
//! | absent   | events             | adopt `ts`, return the batch           |
//! | 1        | history drifted    | adopt `ts`, poll again                 |
//! | 4        | bad version        | fail, cursor untouched                 |
//! | other    | key/session expired| drop server and key, bootstrap, poll   |
//!
//! Resync is unbounded: every repeat either advances `ts` or forces a fresh
//! bootstrap, so a well-behaved server always lets the loop progress. A
//! server that keeps failing keeps the caller waiting; each resync is
//! logged.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use vkrelay_domain::constants::{
    DEFAULT_GROUP_LONG_POLL_VERSION, DEFAULT_LONG_POLL_WAIT_SECS, DEFAULT_USER_LONG_POLL_VERSION,
    LONG_POLL_ACT,
};
use vkrelay_domain::{
    params, Cursor, LongPollBatch, LongPollConfig, LongPollServer, LongPollState, PollResponse,
    Result, TransportRequest, VkRelayError,
};

use crate::session::Session;

/// Which long-poll flavour to bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongPollKind {
    /// `messages.getLongPollServer`; the server comes back without a scheme
    User { use_https: bool },
    /// `groups.getLongPollServer`; the server comes back as a full URL
    Group { group_id: i64 },
}

impl LongPollKind {
    fn bootstrap_method(&self) -> &'static str {
        match self {
            Self::User { .. } => "messages.getLongPollServer",
            Self::Group { .. } => "groups.getLongPollServer",
        }
    }

    fn server_url(&self, server: &str) -> String {
        match self {
            Self::User { use_https } => {
                format!("{}://{}", if *use_https { "https" } else { "http" }, server)
            }
            Self::Group { .. } => server.to_string(),
        }
    }
}

/// Fixed protocol options sent with every poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongPollSettings {
    /// Server-side wait window in seconds
    pub wait_secs: u64,
    /// Answer-option bitmask, omitted when `None`
    pub mode: Option<u32>,
    pub version: u32,
    /// Timeout of the bootstrap call; the session default when `None`
    pub bootstrap_timeout: Option<Duration>,
}

impl Default for LongPollSettings {
    fn default() -> Self {
        Self::user()
    }
}

impl From<&LongPollConfig> for LongPollSettings {
    fn from(config: &LongPollConfig) -> Self {
        Self {
            wait_secs: config.wait_secs,
            mode: config.mode,
            version: config.version,
            bootstrap_timeout: None,
        }
    }
}

impl LongPollSettings {
    pub fn user() -> Self {
        Self {
            wait_secs: DEFAULT_LONG_POLL_WAIT_SECS,
            mode: None,
            version: DEFAULT_USER_LONG_POLL_VERSION,
            bootstrap_timeout: None,
        }
    }

    pub fn group() -> Self {
        Self { version: DEFAULT_GROUP_LONG_POLL_VERSION, ..Self::user() }
    }

    pub fn with_wait_secs(mut self, wait_secs: u64) -> Self {
        self.wait_secs = wait_secs;
        self
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Combine individual answer-option flags (their sum is sent)
    pub fn with_mode_flags(mut self, flags: &[u32]) -> Self {
        self.mode = Some(flags.iter().sum());
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_bootstrap_timeout(mut self, timeout: Duration) -> Self {
        self.bootstrap_timeout = Some(timeout);
        self
    }

    /// Local request timeout: twice the server wait window
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_secs.saturating_mul(2))
    }
}

/// Resumable long-poll reader
///
/// Polls are strictly sequential: `wait_once` takes `&mut self`.
#[derive(Debug)]
pub struct LongPollClient {
    session: Arc<Session>,
    kind: LongPollKind,
    settings: LongPollSettings,
    cursor: Cursor,
}

impl LongPollClient {
    pub fn new(session: Arc<Session>, kind: LongPollKind, settings: LongPollSettings) -> Self {
        Self { session, kind, settings, cursor: Cursor::default() }
    }

    pub fn user(session: Arc<Session>) -> Self {
        Self::new(session, LongPollKind::User { use_https: true }, LongPollSettings::user())
    }

    pub fn group(session: Arc<Session>, group_id: i64) -> Self {
        Self::new(session, LongPollKind::Group { group_id }, LongPollSettings::group())
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn state(&self) -> LongPollState {
        self.cursor.state()
    }

    pub fn kind(&self) -> LongPollKind {
        self.kind
    }

    /// Fetch a server, key and fresh cursor through the session.
    ///
    /// # Errors
    ///
    /// Anything the session returns, or `Protocol` when the answer lacks
    /// the server fields.
    #[instrument(skip(self), fields(method = self.kind.bootstrap_method()))]
    pub async fn bootstrap(&mut self, need_pts: bool) -> Result<()> {
        let arguments = match self.kind {
            LongPollKind::User { .. } => params! {
                "need_pts" => u8::from(need_pts),
                "lp_version" => self.settings.version,
            },
            LongPollKind::Group { group_id } => params! { "group_id" => group_id },
        };

        let response = self
            .session
            .send(self.kind.bootstrap_method(), arguments, self.settings.bootstrap_timeout)
            .await?;
        let server: LongPollServer = serde_json::from_value(response)
            .map_err(|err| VkRelayError::Protocol(format!("long-poll server response: {err}")))?;

        let url = self.kind.server_url(&server.server);
        debug!(server = %url, ts = server.ts, pts = ?server.pts, "long-poll server acquired");
        self.cursor.adopt(server, url);
        Ok(())
    }

    /// Wait for the next batch of events.
    ///
    /// # Errors
    ///
    /// - `LongPoll { code: 4 }` on a version mismatch
    /// - `LongPoll { code: 403 }` (or another non-2xx status) from the server
    /// - `Protocol` for undecodable bodies
    /// - `Closed` when the session closes mid-poll
    #[instrument(skip(self))]
    pub async fn wait_once(&mut self) -> Result<LongPollBatch> {
        loop {
            let (server, key, ts) = match self.active_cursor() {
                Some(active) => active,
                None => {
                    self.bootstrap(false).await?;
                    match self.active_cursor() {
                        Some(active) => active,
                        None => {
                            return Err(VkRelayError::Internal(
                                "bootstrap left the long-poll cursor empty".into(),
                            ))
                        }
                    }
                }
            };

            let response = self.poll(server, key, ts).await?;

            match response.failed {
                None => {
                    let ts = response.ts.ok_or_else(|| {
                        VkRelayError::Protocol("long-poll response without ts".into())
                    })?;
                    self.cursor.advance(ts);
                    if response.pts.is_some() {
                        self.cursor.pts = response.pts;
                    }
                    debug!(ts, updates = response.updates.len(), "long-poll batch received");
                    return Ok(LongPollBatch { ts, updates: response.updates, pts: self.cursor.pts });
                }
                Some(1) => {
                    let ts = response.ts.ok_or_else(|| {
                        VkRelayError::Protocol("long-poll failed=1 without ts".into())
                    })?;
                    info!(ts, "long-poll history drifted, adopting new ts");
                    self.cursor.advance(ts);
                }
                Some(4) => {
                    warn!(version = self.settings.version, "long-poll version rejected");
                    return Err(VkRelayError::LongPoll {
                        code: 4,
                        description: "An invalid version number was passed in the version parameter"
                            .into(),
                    });
                }
                Some(code) => {
                    info!(code, "long-poll key expired, re-bootstrapping");
                    self.cursor.invalidate();
                }
            }
        }
    }

    /// Endless stream of individual events, in order.
    ///
    /// The stream ends after yielding the first error. Dropping it drops
    /// the in-flight poll.
    pub fn events(self) -> impl Stream<Item = Result<Value>> + Send {
        stream::unfold(
            (self, VecDeque::new(), false),
            |(mut client, mut pending, finished)| async move {
                if finished {
                    return None;
                }
                loop {
                    if let Some(event) = pending.pop_front() {
                        return Some((Ok(event), (client, pending, false)));
                    }
                    match client.wait_once().await {
                        Ok(batch) => pending.extend(batch.updates),
                        Err(err) => return Some((Err(err), (client, pending, true))),
                    }
                }
            },
        )
    }

    /// The persistent-state marker (`pts`), fetched only when unknown.
    pub async fn persistent_marker(&mut self) -> Result<i64> {
        self.persistent_marker_with_ts().await.map(|(pts, _)| pts)
    }

    /// The persistent-state marker together with the current `ts`.
    pub async fn persistent_marker_with_ts(&mut self) -> Result<(i64, i64)> {
        if self.state() == LongPollState::Uninitialized || self.cursor.pts.is_none() {
            self.bootstrap(true).await?;
        }
        match (self.cursor.pts, self.cursor.ts) {
            (Some(pts), Some(ts)) => Ok((pts, ts)),
            (None, _) => Err(VkRelayError::Protocol("long-poll server returned no pts".into())),
            (_, None) => Err(VkRelayError::Protocol("long-poll server returned no ts".into())),
        }
    }

    fn active_cursor(&self) -> Option<(String, String, i64)> {
        match (&self.cursor.server, &self.cursor.key, self.cursor.ts) {
            (Some(server), Some(key), Some(ts)) => Some((server.clone(), key.clone(), ts)),
            _ => None,
        }
    }

    async fn poll(&self, server: String, key: String, ts: i64) -> Result<PollResponse> {
        let mut query = vec![
            ("ts".to_string(), ts.to_string()),
            ("key".to_string(), key),
            ("act".to_string(), LONG_POLL_ACT.to_string()),
            ("wait".to_string(), self.settings.wait_secs.to_string()),
            ("version".to_string(), self.settings.version.to_string()),
        ];
        if let Some(mode) = self.settings.mode {
            query.push(("mode".to_string(), mode.to_string()));
        }

        let request = TransportRequest::get(server, query, self.settings.poll_timeout());
        let response = self.session.exchange(request).await?;

        if response.status == 403 {
            return Err(VkRelayError::LongPoll {
                code: 403,
                description: "long-poll server refused the request".into(),
            });
        }
        if !response.is_success() {
            return Err(VkRelayError::LongPoll {
                code: i64::from(response.status),
                description: format!("unexpected long-poll status {}", response.status),
            });
        }

        serde_json::from_str(&response.body)
            .map_err(|err| VkRelayError::Protocol(format!("undecodable long-poll body: {err}")))
    }
}
