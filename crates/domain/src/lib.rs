//! # vkrelay Domain
//!
//! Data types and models shared by every vkrelay crate.
//!
//! This crate contains:
//! - Call, credential, remote-error and long-poll cursor types
//! - The `VkRelayError` taxonomy and `Result` alias
//! - Configuration structures
//! - Protocol constants (error codes, default endpoints)
//!
//! ## Architecture
//! - No dependencies on other vkrelay crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
