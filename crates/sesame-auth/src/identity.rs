//! External identity provider boundary.

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use sesame_core::{ConfigError, ExternalClaims, IdentityConfig};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Signing keys are re-fetched at most this often unless an unknown key id shows up.
const KEY_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// An unknown key id only triggers a refetch once the cached set is at least this old.
const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(60);

/// Reasons an external identity token is rejected.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity token is empty")]
    EmptyToken,

    #[error("identity token rejected: {0}")]
    Rejected(String),

    #[error("identity token carries no subject")]
    MissingSubject,

    #[error("no signing key with id {0}")]
    UnknownKey(String),

    #[error("failed to fetch signing keys: {0}")]
    KeyFetch(String),

    #[error("identity verification timed out")]
    Timeout,
}

/// Verifies a raw external identity token and maps it onto [`ExternalClaims`].
#[async_trait]
pub trait IdentityBridge: Send + Sync {
    async fn verify(&self, raw: &str) -> Result<ExternalClaims, IdentityError>;
}

/// Fixed token -> claims table, for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityBridge {
    tokens: HashMap<String, ExternalClaims>,
}

impl StaticIdentityBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as proof of `claims`.
    pub fn with_token(mut self, token: impl Into<String>, claims: ExternalClaims) -> Self {
        self.tokens.insert(token.into(), claims);
        self
    }
}

#[async_trait]
impl IdentityBridge for StaticIdentityBridge {
    async fn verify(&self, raw: &str) -> Result<ExternalClaims, IdentityError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(IdentityError::EmptyToken);
        }
        self.tokens
            .get(raw)
            .cloned()
            .ok_or_else(|| IdentityError::Rejected("unknown token".to_string()))
    }
}

struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
}

impl CachedKeys {
    /// Answer from the cache, or `None` when a fetch is due.
    fn lookup(&self, kid: &str) -> Option<Result<Jwk, IdentityError>> {
        let age = self.fetched_at.elapsed();
        if age >= KEY_CACHE_TTL {
            return None;
        }
        match self.set.find(kid) {
            Some(jwk) => Some(Ok(jwk.clone())),
            None if age < MIN_REFETCH_INTERVAL => {
                Some(Err(IdentityError::UnknownKey(kid.to_string())))
            }
            // The provider may have rotated keys.
            None => None,
        }
    }
}

/// Verifies Firebase ID tokens: RS256 against the published key set, plus `iss`, `aud` and `exp`.
///
/// The HTTP client is passed in by the caller and shared; the bridge keeps no global state.
pub struct FirebaseIdentityBridge {
    http: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: String,
    timeout: Duration,
    keys: RwLock<Option<CachedKeys>>,
}

impl FirebaseIdentityBridge {
    pub fn new(http: reqwest::Client, config: &IdentityConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            http,
            jwks_url: config.jwks_url.clone(),
            issuer: config.effective_issuer(),
            audience: config.effective_audience(),
            timeout: config.timeout(),
            keys: RwLock::new(None),
        })
    }

    async fn verify_signed(&self, raw: &str) -> Result<ExternalClaims, IdentityError> {
        let header =
            jsonwebtoken::decode_header(raw).map_err(|e| IdentityError::Rejected(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::Rejected(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::Rejected("missing key id".to_string()))?;

        let jwk = self.signing_key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| IdentityError::Rejected(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let data = jsonwebtoken::decode::<Map<String, Value>>(raw, &key, &validation)
            .map_err(|e| IdentityError::Rejected(e.to_string()))?;

        ExternalClaims::from_raw(&data.claims).ok_or(IdentityError::MissingSubject)
    }

    async fn signing_key(&self, kid: &str) -> Result<Jwk, IdentityError> {
        let cached = self.keys.read().await.as_ref().and_then(|c| c.lookup(kid));
        if let Some(answer) = cached {
            return answer;
        }

        // Fetch under the write lock so concurrent misses share one request.
        let mut cache = self.keys.write().await;
        if let Some(answer) = cache.as_ref().and_then(|c| c.lookup(kid)) {
            return answer;
        }

        let set = self.fetch_keys().await?;
        let found = set.find(kid).cloned();
        *cache = Some(CachedKeys {
            set,
            fetched_at: Instant::now(),
        });

        found.ok_or_else(|| IdentityError::UnknownKey(kid.to_string()))
    }

    async fn fetch_keys(&self) -> Result<JwkSet, IdentityError> {
        debug!(url = %self.jwks_url, "fetching identity provider signing keys");
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IdentityError::KeyFetch(e.to_string()))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| IdentityError::KeyFetch(e.to_string()))
    }
}

#[async_trait]
impl IdentityBridge for FirebaseIdentityBridge {
    async fn verify(&self, raw: &str) -> Result<ExternalClaims, IdentityError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(IdentityError::EmptyToken);
        }

        match tokio::time::timeout(self.timeout, self.verify_signed(raw)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.timeout, "identity verification timed out");
                Err(IdentityError::Timeout)
            }
        }
    }
}
