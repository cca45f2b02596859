//! Configuration types for the Sesame token lifecycle.
//!
//! Loaded as the `[auth]` table of the server configuration file. Secrets
//! (signing secret, refresh pepper) are resolved from an environment variable,
//! then a file, then an inline value.

pub mod identity;
pub mod refresh;
pub mod token;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use identity::IdentityConfig;
pub use refresh::RefreshConfig;
pub use token::TokenConfig;

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No signing secret could be resolved.
    #[error("access token signing secret is not configured")]
    MissingSigningSecret,

    /// No refresh token pepper could be resolved.
    #[error("refresh token pepper is not configured")]
    MissingPepper,

    /// The pepper must be a different secret from the signing secret.
    #[error("refresh token pepper must differ from the signing secret")]
    PepperReusesSigningSecret,

    /// Identity provider project id is empty.
    #[error("identity provider project id is not configured")]
    MissingProjectId,

    /// A configured lifetime is zero, negative or too long.
    #[error("{field} must be between 1 and {max}, got {value}")]
    InvalidTtl {
        field: &'static str,
        value: i64,
        max: i64,
    },

    /// Failed to read a secret file.
    #[error("failed to read secret file {path}: {source}")]
    SecretFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Access token signing settings.
    #[serde(default)]
    pub token: TokenConfig,

    /// Refresh token settings.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// External identity provider settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Roles granted to a user the first time they are seen.
    #[serde(default = "default_roles")]
    pub default_roles: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: TokenConfig::default(),
            refresh: RefreshConfig::default(),
            identity: IdentityConfig::default(),
            default_roles: default_roles(),
        }
    }
}

fn default_roles() -> Vec<String> {
    vec!["client".to_string()]
}

impl AuthConfig {
    /// Check the token and refresh lifetimes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.token.validate()?;
        self.refresh.validate()
    }

    /// Validate the configuration, then resolve the signing secret and the refresh pepper.
    pub fn resolve_secrets(&self) -> Result<ResolvedSecrets, ConfigError> {
        self.validate()?;
        let signing_secret = self
            .token
            .resolve_secret()?
            .ok_or(ConfigError::MissingSigningSecret)?;
        let pepper = self
            .refresh
            .resolve_pepper()?
            .ok_or(ConfigError::MissingPepper)?;

        if pepper == signing_secret {
            return Err(ConfigError::PepperReusesSigningSecret);
        }

        Ok(ResolvedSecrets {
            signing_secret,
            pepper,
        })
    }
}

/// Secrets read once at startup and shared read-only afterwards.
#[derive(Clone)]
pub struct ResolvedSecrets {
    pub signing_secret: String,
    pub pepper: String,
}

impl fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("signing_secret", &"<redacted>")
            .field("pepper", &"<redacted>")
            .finish()
    }
}

/// Environment variable first, then file, then inline value. Blank values count as unset.
pub(crate) fn resolve_secret(
    env_var: Option<&str>,
    file: Option<&Path>,
    inline: Option<&str>,
) -> Result<Option<String>, ConfigError> {
    if let Some(var) = env_var {
        if let Ok(value) = std::env::var(var) {
            let value = value.trim();
            if !value.is_empty() {
                return Ok(Some(value.to_string()));
            }
        }
    }

    if let Some(path) = file {
        if path.exists() {
            let value = std::fs::read_to_string(path).map_err(|source| ConfigError::SecretFile {
                path: path.to_path_buf(),
                source,
            })?;
            let value = value.trim();
            if !value.is_empty() {
                return Ok(Some(value.to_string()));
            }
        }
    }

    Ok(inline
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string))
}
