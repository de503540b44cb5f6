use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const UNKNOWN: &str = "unknown";

/// Identity a rate limit is tracked against (client address, account id, ...).
///
/// Opaque to the limiter. Callers are responsible for making keys stable per
/// caller and distinct across callers, e.g. by prefixing the key kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RateLimitKey(String);

impl RateLimitKey {
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ConfigError::EmptyKey);
        }
        Ok(Self(key))
    }

    /// Bucket shared by every caller that carries nothing identifying.
    pub fn unknown() -> Self {
        Self(UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RateLimitKey {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RateLimitKey> for String {
    fn from(key: RateLimitKey) -> Self {
        key.0
    }
}
