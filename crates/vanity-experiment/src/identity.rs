//! Visitor identity
//!
//! Provides [`Identity`], the opaque token every assignment is keyed by.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Number of random bytes in a generated identity (32 hex chars)
const GENERATED_BYTES: usize = 16;

/// Opaque, stable per-visitor token
///
/// Identities come from a cookie, an authenticated user's primary key or an
/// application callback. Freshly generated identities are 32 lowercase hex
/// characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap an existing token
    #[inline]
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Generate a new random identity
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; GENERATED_BYTES] = rand::random();
        Self(hex::encode(bytes))
    }

    /// Borrow the token
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the inner token
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Identity {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for Identity {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identity_is_lowercase_hex() {
        let identity = Identity::generate();
        assert_eq!(identity.as_str().len(), 32);
        assert!(identity
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn generated_identities_differ() {
        assert_ne!(Identity::generate(), Identity::generate());
    }

    #[test]
    fn identity_display_is_raw_token() {
        let identity = Identity::from("from_last_time");
        assert_eq!(identity.to_string(), "from_last_time");
    }

    #[test]
    fn identity_serializes_transparently() {
        let json = serde_json::to_string(&Identity::new("999")).unwrap();
        assert_eq!(json, "\"999\"");
    }
}
