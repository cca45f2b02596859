//! Token creation and verification.

use crate::claims::{ACCESS_TOKEN_TYPE, AccessClaims};
use crate::error::TokenError;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sesame_core::{RoleSet, TokenConfig};
use std::str::FromStr;

/// Mints and verifies access tokens with a shared secret.
///
/// Holds no state besides configuration, so one instance is shared by every request.
pub struct TokenService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    default_ttl: Duration,
}

impl TokenService {
    /// Create a token service for an HMAC algorithm identifier (`HS256`, `HS384`, `HS512`).
    pub fn new(secret: &str, algorithm: &str, default_ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        let algorithm = Algorithm::from_str(algorithm.trim())
            .map_err(|_| TokenError::UnsupportedAlgorithm(algorithm.to_string()))?;
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(TokenError::UnsupportedAlgorithm(format!("{:?}", algorithm)));
        }

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            default_ttl,
        })
    }

    /// Create a token service from configuration and an already resolved secret.
    pub fn from_config(config: &TokenConfig, secret: &str) -> Result<Self, TokenError> {
        Self::new(secret, &config.algorithm, config.access_ttl())
    }

    /// Default lifetime applied when `mint` is called without a TTL.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Mint an access token for `subject` carrying a snapshot of `roles`.
    pub fn mint(
        &self,
        subject: &str,
        roles: &RoleSet,
        ttl: Option<Duration>,
    ) -> Result<String, TokenError> {
        self.mint_at(subject, roles, ttl, Utc::now().timestamp())
    }

    /// Mint with an explicit clock (seconds since epoch).
    pub fn mint_at(
        &self,
        subject: &str,
        roles: &RoleSet,
        ttl: Option<Duration>,
        now: i64,
    ) -> Result<String, TokenError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let claims = AccessClaims {
            sub: subject.to_string(),
            roles: roles.to_vec(),
            iat: now,
            exp: now.saturating_add(ttl.num_seconds()),
            typ: ACCESS_TOKEN_TYPE.to_string(),
        };
        self.sign(&claims)
    }

    /// Verify an access token and return its claims.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify with an explicit clock (seconds since epoch).
    ///
    /// Checks run in order: signature and structure, expiry, type tag.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<AccessClaims, TokenError> {
        let data = jsonwebtoken::decode::<AccessClaims>(
            token.trim(),
            &self.decoding_key,
            &self.validation(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired { expired_at: now },
            _ => {
                tracing::debug!(error = %e, "access token rejected");
                TokenError::InvalidSignature
            }
        })?;

        let claims = data.claims;
        if claims.is_expired_at(now) {
            return Err(TokenError::Expired {
                expired_at: claims.exp,
            });
        }
        if claims.typ != ACCESS_TOKEN_TYPE {
            return Err(TokenError::WrongTokenType { found: claims.typ });
        }

        Ok(claims)
    }

    fn sign(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| TokenError::SigningFailed(e.to_string()))
    }

    // Expiry is checked by `verify_at` so that a token is already invalid at its expiry second.
    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();
        validation
    }
}
