//! Access token signing configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::{ConfigError, resolve_secret};

/// Longest accepted access token lifetime: one day.
pub const MAX_ACCESS_TTL_MINUTES: i64 = 24 * 60;

/// Configuration for minting and verifying access tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Inline signing secret. Prefer `secret_env` or `secret_file` outside development.
    #[serde(default)]
    pub secret: Option<String>,

    /// Environment variable containing the signing secret.
    #[serde(default = "default_secret_env")]
    pub secret_env: Option<String>,

    /// Path to a file containing the signing secret.
    #[serde(default)]
    pub secret_file: Option<PathBuf>,

    /// Signing algorithm identifier (HS256, HS384 or HS512).
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Default access token lifetime in minutes.
    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: None,
            secret_env: default_secret_env(),
            secret_file: None,
            algorithm: default_algorithm(),
            access_ttl_minutes: default_access_ttl_minutes(),
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("secret_env", &self.secret_env)
            .field("secret_file", &self.secret_file)
            .field("algorithm", &self.algorithm)
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .finish()
    }
}

impl TokenConfig {
    /// Resolve the signing secret from environment, file or inline value.
    pub fn resolve_secret(&self) -> Result<Option<String>, ConfigError> {
        resolve_secret(
            self.secret_env.as_deref(),
            self.secret_file.as_deref(),
            self.secret.as_deref(),
        )
    }

    /// Reject lifetimes outside `1..=MAX_ACCESS_TTL_MINUTES`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_ACCESS_TTL_MINUTES).contains(&self.access_ttl_minutes) {
            return Err(ConfigError::InvalidTtl {
                field: "token.access_ttl_minutes",
                value: self.access_ttl_minutes,
                max: MAX_ACCESS_TTL_MINUTES,
            });
        }
        Ok(())
    }

    /// Default access token lifetime, clamped to the accepted range.
    pub fn access_ttl(&self) -> Duration {
        Duration::minutes(self.access_ttl_minutes.clamp(1, MAX_ACCESS_TTL_MINUTES))
    }
}

fn default_secret_env() -> Option<String> {
    Some("SESAME_JWT_SECRET".to_string())
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_access_ttl_minutes() -> i64 {
    15
}
