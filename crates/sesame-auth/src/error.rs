//! Error taxonomy of the auth layer.

use crate::identity::IdentityError;
use sesame_store::StoreError;
use sesame_token::TokenError;
use thiserror::Error;

/// Errors surfaced to callers of the auth layer. Every variant is terminal for the request.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no bearer token presented")]
    MissingCredential,

    #[error("access token malformed or signature mismatch")]
    InvalidSignature,

    #[error("access token expired")]
    ExpiredToken,

    #[error("token type is not an access token")]
    WrongTokenType,

    #[error("user no longer exists")]
    UserNotFound,

    #[error("identity verification failed: {0}")]
    IdentityVerificationFailed(String),

    #[error("empty refresh token")]
    MissingRefreshToken,

    #[error("unknown refresh token")]
    UnknownRefreshToken,

    #[error("refresh token revoked")]
    RevokedRefreshToken,

    #[error("refresh token expired")]
    ExpiredRefreshToken,

    /// Authenticated, but lacking the listed roles (alphabetical).
    #[error("missing roles: {}", .0.join(","))]
    MissingRoles(Vec<String>),

    /// Admin target absent: `user_not_found` or `role_not_found`.
    #[error("{0}")]
    EntityNotFound(&'static str),

    /// Any other failure. Never part of the client-facing taxonomy.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            AuthError::MissingRoles(_) => 403,
            AuthError::EntityNotFound(_) => 404,
            AuthError::Internal(_) => 500,
            _ => 401,
        }
    }

    /// Stable machine-readable reason code.
    pub fn reason(&self) -> String {
        match self {
            AuthError::MissingCredential => "missing_bearer_token".to_string(),
            AuthError::InvalidSignature => "access_token_invalid".to_string(),
            AuthError::ExpiredToken => "access_token_expired".to_string(),
            AuthError::WrongTokenType => "access_token_wrong_type".to_string(),
            AuthError::UserNotFound => "user_not_found".to_string(),
            AuthError::IdentityVerificationFailed(_) => "identity_verification_failed".to_string(),
            AuthError::MissingRefreshToken => "missing_refresh_token".to_string(),
            AuthError::UnknownRefreshToken => "refresh_unknown".to_string(),
            AuthError::RevokedRefreshToken => "refresh_revoked".to_string(),
            AuthError::ExpiredRefreshToken => "refresh_expired".to_string(),
            AuthError::MissingRoles(missing) => format!("missing_roles:{}", missing.join(",")),
            AuthError::EntityNotFound(what) => (*what).to_string(),
            AuthError::Internal(_) => "internal_error".to_string(),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidSignature => AuthError::InvalidSignature,
            TokenError::Expired { .. } => AuthError::ExpiredToken,
            TokenError::WrongTokenType { .. } => AuthError::WrongTokenType,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownRefreshToken => AuthError::UnknownRefreshToken,
            StoreError::RevokedRefreshToken => AuthError::RevokedRefreshToken,
            StoreError::ExpiredRefreshToken => AuthError::ExpiredRefreshToken,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        AuthError::IdentityVerificationFailed(err.to_string())
    }
}
