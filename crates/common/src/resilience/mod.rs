//! Resilience patterns for pacing outbound work
//!
//! - **Permit pool**: a token bucket refilled to full once per period by a
//!   background task, giving "at most N operations per period" with bursts
//!   allowed right after each refill.

pub mod rate_limiter;

pub use rate_limiter::{PermitError, PermitPool, PermitPoolConfig, PermitPoolConfigBuilder};
