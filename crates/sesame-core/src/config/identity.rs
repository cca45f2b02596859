//! External identity provider configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ConfigError;

const SECURETOKEN_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Settings for verifying identity tokens issued by the external provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Provider project identifier.
    #[serde(default)]
    pub project_id: String,

    /// Expected `iss` claim. Defaults to the secure token issuer of `project_id`.
    #[serde(default)]
    pub issuer: Option<String>,

    /// Expected `aud` claim. Defaults to `project_id`.
    #[serde(default)]
    pub audience: Option<String>,

    /// JSON Web Key Set used to verify provider signatures.
    #[serde(default = "default_jwks_url")]
    pub jwks_url: String,

    /// Upper bound for a single verification, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            issuer: None,
            audience: None,
            jwks_url: default_jwks_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl IdentityConfig {
    /// Fail if no project id is configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::MissingProjectId);
        }
        Ok(())
    }

    pub fn effective_issuer(&self) -> String {
        self.issuer
            .clone()
            .unwrap_or_else(|| format!("{}{}", SECURETOKEN_ISSUER_PREFIX, self.project_id))
    }

    pub fn effective_audience(&self) -> String {
        self.audience
            .clone()
            .unwrap_or_else(|| self.project_id.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_jwks_url() -> String {
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com"
        .to_string()
}

fn default_timeout_secs() -> u64 {
    5
}
