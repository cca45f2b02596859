//! Refresh secret generation and at-rest digest.

use crate::error::StoreError;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// 512 bits of entropy per refresh secret.
const SECRET_BYTES: usize = 64;

/// A raw refresh secret. Only ever handed to the caller; never stored or logged.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshSecret(String);

impl RefreshSecret {
    /// Generate a new secret from the thread-local CSPRNG, URL-safe base64 encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for RefreshSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshSecret(<redacted>)")
    }
}

/// Keyed digest of refresh secrets: `hex(HMAC-SHA256(pepper, secret))`.
#[derive(Clone)]
pub struct RefreshSecretHasher {
    pepper: Vec<u8>,
}

impl RefreshSecretHasher {
    pub fn new(pepper: &str) -> Result<Self, StoreError> {
        if pepper.is_empty() {
            return Err(StoreError::EmptyPepper);
        }
        Ok(Self {
            pepper: pepper.as_bytes().to_vec(),
        })
    }

    pub fn digest(&self, raw: &str) -> String {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.pepper)
            .expect("HMAC can take key of any size");
        mac.update(raw.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for RefreshSecretHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshSecretHasher(<redacted>)")
    }
}
