//! Access credential

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque access token.
///
/// `Debug` and `Display` never print the token itself, so credentials can
/// travel through `tracing` fields safely.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for placing on the wire.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Empty tokens mean "anonymous" and are never sent.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(***{})", self.0.len())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let credential = Credential::new("secret-token");
        let rendered = format!("{credential:?} {credential}");
        assert!(!rendered.contains("secret"));
        assert_eq!(credential.expose(), "secret-token");
    }

    #[test]
    fn test_empty_credential() {
        assert!(Credential::new("").is_empty());
        assert!(!Credential::from("abc").is_empty());
    }
}
