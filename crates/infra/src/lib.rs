//! # vkrelay Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - `HttpTransport`: the reqwest-backed [`Transport`](vkrelay_core::Transport)
//! - `AuthorizationCodeFlow`: OAuth code exchange as a re-authenticator
//! - Configuration loading from environment variables and files
//! - Logging bootstrap
//! - `VkClient`: wires transport, rate limiter and session from a config
//!
//! ## Architecture
//! - Implements traits defined in `vkrelay-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use auth::AuthorizationCodeFlow;
pub use client::{VkClient, VkClientBuilder};
pub use errors::InfraError;
pub use http::{HttpTransport, HttpTransportBuilder};
pub use observability::init_logging;
