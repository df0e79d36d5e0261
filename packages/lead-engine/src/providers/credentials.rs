//! Provider API keys.
//!
//! Uses the `secrecy` crate so keys never reach logs or debug output.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

use crate::error::ConfigError;

/// An API key that won't be logged or displayed.
pub struct ApiKey(SecretBox<str>);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Read the key for `provider` from the environment variable `var`.
    pub fn from_env(var: &str, provider: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(var, provider, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        var: &str,
        provider: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        match lookup(var).filter(|v| !v.trim().is_empty()) {
            Some(value) => Ok(Self::new(value.trim())),
            None => Err(ConfigError::MissingEnv {
                key: var.to_string(),
                provider: provider.to_string(),
            }),
        }
    }

    /// Only call this when building a request.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for ApiKey {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_not_in_debug() {
        let key = ApiKey::new("sk-lead-secret");
        let debug = format!("{:?}", key);
        assert!(!debug.contains("sk-lead"));
        assert_eq!(key.expose(), "sk-lead-secret");
    }

    #[test]
    fn test_missing_or_blank_env_is_an_error() {
        let err = ApiKey::from_lookup("FDIC_KEY", "fdic", |_| Some("  ".into())).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingEnv {
                key: "FDIC_KEY".into(),
                provider: "fdic".into()
            }
        );
        let key = ApiKey::from_lookup("FDIC_KEY", "fdic", |_| Some(" abc ".into())).unwrap();
        assert_eq!(key.expose(), "abc");
    }
}
