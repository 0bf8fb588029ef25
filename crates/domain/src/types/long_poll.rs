//! Long-poll cursor and wire shapes
//!
//! The cursor is the `(ts, pts, key, server)` tuple that marks where in the
//! remote event stream a client last read. `server`/`key` are dropped when
//! the remote says the session is stale, which forces a fresh bootstrap.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use crate::impl_status_conversions;

/// Whether a long-poll client currently knows a server to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongPollState {
    Uninitialized,
    Active,
}

impl_status_conversions!(LongPollState {
    Uninitialized => "uninitialized",
    Active => "active",
});

/// Result of a "get long-poll server" call.
///
/// `ts` arrives as a number from the user endpoint and as a numeric string
/// from the group endpoint; both are accepted.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LongPollServer {
    pub server: String,
    pub key: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub ts: i64,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub pts: Option<i64>,
}

/// Body of a poll response: either a batch (`ts` + `updates`) or a
/// `failed` code (1 = ts drift, 2/3 = key or session expired, 4 = bad
/// version).
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PollResponse {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub ts: Option<i64>,
    #[serde(default)]
    pub updates: Vec<Value>,
    #[serde(default)]
    pub failed: Option<i64>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub pts: Option<i64>,
}

/// One successful poll: the new cursor position and the events it carried.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongPollBatch {
    pub ts: i64,
    pub updates: Vec<Value>,
    pub pts: Option<i64>,
}

/// Position in the remote event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Event sequence marker.
    pub ts: Option<i64>,
    /// Persistent-state marker.
    pub pts: Option<i64>,
    /// Session key for the current server.
    pub key: Option<String>,
    /// Fully-qualified poll URL.
    pub server: Option<String>,
}

impl Cursor {
    pub fn state(&self) -> LongPollState {
        if self.server.is_some() && self.key.is_some() {
            LongPollState::Active
        } else {
            LongPollState::Uninitialized
        }
    }

    /// Replace the whole cursor with a freshly bootstrapped one.
    pub fn adopt(&mut self, server: LongPollServer, server_url: String) {
        self.ts = Some(server.ts);
        self.pts = server.pts;
        self.key = Some(server.key);
        self.server = Some(server_url);
    }

    /// Drop the server and key; the next use has to bootstrap again.
    pub fn invalidate(&mut self) {
        self.server = None;
        self.key = None;
    }

    pub fn advance(&mut self, ts: i64) {
        self.ts = Some(ts);
    }
}
