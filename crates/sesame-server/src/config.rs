use serde::{Deserialize, Serialize};
use sesame_core::AuthConfig;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "SESAME_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:8080"
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Path to the SQLite file holding users, roles and refresh tokens.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_database_path() -> String {
    "data/sesame.sqlite".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            database_path: default_database_path(),
        }
    }
}

/// Load the configuration from `explicit`, `$SESAME_CONFIG` or `sesame.toml`.
/// A missing file yields the defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = config_path(explicit);
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(&path)?;
    let cfg: AppConfig = toml::from_str(&raw)?;
    tracing::info!(path = %path.display(), "loaded config");
    Ok(cfg)
}

fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    if let Ok(p) = env::var(CONFIG_ENV) {
        return PathBuf::from(p);
    }
    PathBuf::from("sesame.toml")
}
