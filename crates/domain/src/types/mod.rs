//! Domain types and models

pub mod call;
pub mod credential;
pub mod long_poll;
pub mod remote;
pub mod transport;

pub use call::{Call, Params};
pub use credential::Credential;
pub use long_poll::{Cursor, LongPollBatch, LongPollServer, LongPollState, PollResponse};
pub use remote::{Challenge, ExecuteError, RemoteError, ResponseEnvelope};
pub use transport::{FormParams, RequestMethod, TransportRequest, TransportResponse};
