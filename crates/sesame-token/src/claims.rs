//! Access token claims.

use serde::{Deserialize, Serialize};
use sesame_core::RoleSet;

/// Type tag carried by every access token.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims embedded in an access token. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Local user id.
    pub sub: String,

    /// Role names held when the token was minted.
    pub roles: Vec<String>,

    /// Issued at (seconds since epoch).
    pub iat: i64,

    /// Expiry (seconds since epoch).
    pub exp: i64,

    /// Token type discriminator.
    pub typ: String,
}

impl AccessClaims {
    /// Roles as a normalized set.
    pub fn role_set(&self) -> RoleSet {
        self.roles.iter().collect()
    }

    /// A token is invalid at or after its expiry second.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}
