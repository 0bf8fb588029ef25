//! Modular common utilities shared across vkrelay crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: canonical encodings and other pure helpers
//! - `runtime`: async infrastructure (permit-pool rate limiting)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod utils;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use resilience::{PermitError, PermitPool, PermitPoolConfig};
#[cfg(feature = "foundation")]
pub use utils::canonical::canonical_json;
