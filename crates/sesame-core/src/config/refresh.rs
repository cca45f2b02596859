//! Refresh token configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::{ConfigError, resolve_secret};

/// Longest accepted refresh token lifetime: ten years.
pub const MAX_TTL_DAYS: i64 = 3650;

/// Configuration for opaque refresh tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Inline pepper mixed into the stored refresh token digest.
    #[serde(default)]
    pub pepper: Option<String>,

    /// Environment variable containing the pepper.
    #[serde(default = "default_pepper_env")]
    pub pepper_env: Option<String>,

    /// Path to a file containing the pepper.
    #[serde(default)]
    pub pepper_file: Option<PathBuf>,

    /// Default refresh token lifetime in days.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: i64,

    /// Revoke every other usable refresh token of a user when a new one is issued.
    #[serde(default)]
    pub single_device: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            pepper: None,
            pepper_env: default_pepper_env(),
            pepper_file: None,
            ttl_days: default_ttl_days(),
            single_device: false,
        }
    }
}

impl fmt::Debug for RefreshConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshConfig")
            .field("pepper", &self.pepper.as_ref().map(|_| "<redacted>"))
            .field("pepper_env", &self.pepper_env)
            .field("pepper_file", &self.pepper_file)
            .field("ttl_days", &self.ttl_days)
            .field("single_device", &self.single_device)
            .finish()
    }
}

impl RefreshConfig {
    /// Resolve the pepper from environment, file or inline value.
    pub fn resolve_pepper(&self) -> Result<Option<String>, ConfigError> {
        resolve_secret(
            self.pepper_env.as_deref(),
            self.pepper_file.as_deref(),
            self.pepper.as_deref(),
        )
    }

    /// Reject lifetimes outside `1..=MAX_TTL_DAYS`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_TTL_DAYS).contains(&self.ttl_days) {
            return Err(ConfigError::InvalidTtl {
                field: "refresh.ttl_days",
                value: self.ttl_days,
                max: MAX_TTL_DAYS,
            });
        }
        Ok(())
    }

    /// Default refresh token lifetime, clamped to the accepted range.
    pub fn ttl(&self) -> Duration {
        Duration::days(self.ttl_days.clamp(1, MAX_TTL_DAYS))
    }
}

fn default_pepper_env() -> Option<String> {
    Some("SESAME_REFRESH_TOKEN_PEPPER".to_string())
}

fn default_ttl_days() -> i64 {
    30
}
