//! Error types used throughout vkrelay

use std::time::Duration;

use thiserror::Error;

use crate::types::RemoteError;

/// Categories of errors, used by callers deciding whether to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Application-level error reported by the remote service
    Remote,
    /// Credential invalid or expired and re-authentication failed
    Authentication,
    /// An interactive challenge could not be solved
    Challenge,
    /// Long-poll protocol failure (403 or version mismatch)
    LongPoll,
    /// Transport or timeout failure - retryable
    Network,
    /// Malformed or unexpected response bodies
    Protocol,
    /// Invalid configuration, invalid input, closed session
    Config,
}

/// Main error type for vkrelay
#[derive(Error, Debug)]
pub enum VkRelayError {
    #[error("Remote error {}: {}", .0.code, .0.message)]
    Remote(RemoteError),

    #[error("Authentication error: {reason}")]
    Auth { reason: String, redirect_url: Option<String> },

    #[error("Interactive challenge required (sid {challenge_id})")]
    ChallengeRequired { challenge_url: String, challenge_id: String },

    #[error("Long poll error {code}: {description}")]
    LongPoll { code: i64, description: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session closed")]
    Closed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VkRelayError {
    /// Shorthand for an authentication error without a redirect URL.
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth { reason: reason.into(), redirect_url: None }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Remote(_) => ErrorCategory::Remote,
            Self::Auth { .. } => ErrorCategory::Authentication,
            Self::ChallengeRequired { .. } => ErrorCategory::Challenge,
            Self::LongPoll { .. } => ErrorCategory::LongPoll,
            Self::Network(_) | Self::Timeout(_) => ErrorCategory::Network,
            Self::Protocol(_) | Self::Internal(_) => ErrorCategory::Protocol,
            Self::InvalidInput(_) | Self::Config(_) | Self::Closed => ErrorCategory::Config,
        }
    }

    /// Check if a caller may reasonably retry the failed operation
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Network)
    }

    /// The remote error code, when the failure carries one
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Self::Remote(err) => Some(err.code),
            Self::LongPoll { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<RemoteError> for VkRelayError {
    fn from(err: RemoteError) -> Self {
        Self::Remote(err)
    }
}

/// Result type alias for vkrelay operations
pub type Result<T> = std::result::Result<T, VkRelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let remote = VkRelayError::Remote(RemoteError::new(100, "One of the parameters"));
        assert_eq!(remote.category(), ErrorCategory::Remote);
        assert_eq!(VkRelayError::auth("invalid_token").category(), ErrorCategory::Authentication);
        assert_eq!(
            VkRelayError::LongPoll { code: 4, description: "bad version".into() }.category(),
            ErrorCategory::LongPoll
        );
        assert_eq!(VkRelayError::Timeout(Duration::from_secs(1)).category(), ErrorCategory::Network);
        assert_eq!(VkRelayError::Closed.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_only_network_failures_are_retryable() {
        assert!(VkRelayError::Network("reset".into()).is_retryable());
        assert!(VkRelayError::Timeout(Duration::from_secs(3)).is_retryable());
        assert!(!VkRelayError::auth("invalid_token").is_retryable());
        assert!(!VkRelayError::Protocol("not json".into()).is_retryable());
    }

    #[test]
    fn test_remote_code() {
        let err: VkRelayError = RemoteError::new(113, "Invalid user id").into();
        assert_eq!(err.remote_code(), Some(113));
        assert_eq!(err.to_string(), "Remote error 113: Invalid user id");
        assert_eq!(VkRelayError::Closed.remote_code(), None);
    }
}
