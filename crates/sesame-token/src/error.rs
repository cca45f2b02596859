//! Error types for the token crate.

use thiserror::Error;

/// Errors that can occur while minting or verifying access tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Token is malformed or its signature does not match.
    #[error("invalid access token signature")]
    InvalidSignature,

    /// Token has expired.
    #[error("access token expired at {expired_at}")]
    Expired { expired_at: i64 },

    /// Token type tag is not "access".
    #[error("wrong token type: {found}")]
    WrongTokenType { found: String },

    /// Configured algorithm is not a supported HMAC algorithm.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signing secret is empty.
    #[error("signing secret is empty")]
    EmptySecret,

    /// Failed to sign a token.
    #[error("failed to sign token: {0}")]
    SigningFailed(String),
}
