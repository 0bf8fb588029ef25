//! # vkrelay Core
//!
//! Request dispatch and event-stream state machines - no HTTP code.
//!
//! This crate contains:
//! - Port interfaces for the transport and the challenge/re-auth collaborators
//! - `Session`: credential handling with exactly-once captcha and auth retries
//! - `Api` / `LazyApi`: dotted method-path builders on top of a session
//! - `LongPollClient`: the resumable long-poll cursor protocol
//! - `ExecutePool`: batching of many logical calls into `execute` requests
//! - `RateLimitedTransport`: permit-pool pacing in front of any transport
//!
//! ## Architecture Principles
//! - Depends only on `vkrelay-domain` and `vkrelay-common`
//! - All I/O goes through the [`Transport`] port
//! - Everything is testable against a scripted transport

pub mod api;
pub mod longpoll;
pub mod pool;
pub mod ports;
pub mod session;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use api::{Api, DeferredCall, LazyApi, LazyMethod, Method};
pub use longpoll::{LongPollClient, LongPollKind, LongPollSettings};
pub use pool::{CallHandle, ExecutePool};
pub use ports::{ChallengeSolver, NoReauthentication, Reauthenticator, RejectChallenges, Transport};
pub use session::{Session, SessionSettings};
pub use transport::RateLimitedTransport;
