//! API key handling.

use std::fmt;

use thiserror::Error;

/// Key accepted by the public K-samsok test environment.
pub const DEFAULT_API_KEY: &str = "test";

/// Errors raised while accepting an API key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The key was empty or blank.
    #[error("bad API key: key is empty")]
    EmptyKey,

    /// The key contains characters the service never issues.
    #[error("bad API key: key contains whitespace or control characters")]
    InvalidCharacters,
}

/// A checked K-samsok API key.
///
/// Passed by value into the query builder; never stored in shared state.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Accepts `raw` as an API key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the key is blank or contains whitespace or
    /// control characters.
    pub fn new(raw: impl Into<String>) -> Result<Self, AuthError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(AuthError::EmptyKey);
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(AuthError::InvalidCharacters);
        }
        Ok(Self(raw))
    }

    /// Returns the raw key for embedding into request URLs.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keys must not end up in logs via `?args` style debug fields.
impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
