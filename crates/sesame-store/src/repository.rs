//! Store traits consumed by the auth layer.

use crate::error::StoreError;
use crate::secret::RefreshSecret;
use async_trait::async_trait;
use chrono::Duration;
use sesame_core::{ClientMeta, ExternalClaims, RefreshTokenRecord, Role, RoleSet, User};
use uuid::Uuid;

/// Owner of user rows and their role grants.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create the user on first sight (granting `default_roles`), otherwise resync
    /// email, verified flag and last-login timestamp. Durable when this returns.
    async fn upsert(
        &self,
        claims: &ExternalClaims,
        default_roles: &RoleSet,
    ) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
}

/// Role lookups and grants.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Role names currently held by a user.
    async fn role_names(&self, user_id: Uuid) -> Result<RoleSet, StoreError>;

    async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError>;

    /// Returns `true` if the grant was added, `false` if it already existed.
    async fn grant(&self, user_id: Uuid, role_id: i64) -> Result<bool, StoreError>;

    /// Returns `true` if a grant was removed.
    async fn revoke(&self, user_id: Uuid, role_id: i64) -> Result<bool, StoreError>;
}

/// A freshly issued refresh token: the raw secret (for the caller only) and its record.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub secret: RefreshSecret,
    pub record: RefreshTokenRecord,
}

/// Sole owner of refresh token rows and of the at-rest hashing scheme.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Issue a new refresh token. With `single_device`, every other usable token of
    /// the user is revoked in the same transaction.
    async fn issue(
        &self,
        user_id: Uuid,
        ttl: Option<Duration>,
        meta: &ClientMeta,
        single_device: bool,
    ) -> Result<IssuedRefreshToken, StoreError>;

    /// Look up a raw secret by its digest. Checks existence, then revocation, then expiry.
    async fn verify(&self, raw: &str) -> Result<RefreshTokenRecord, StoreError>;

    /// Atomically revoke `record` and issue a replacement for the same user.
    /// At most one concurrent rotation of the same record succeeds.
    async fn rotate(
        &self,
        record: &RefreshTokenRecord,
        meta: &ClientMeta,
    ) -> Result<IssuedRefreshToken, StoreError>;

    /// Revoke every usable token of a user, returning how many were revoked.
    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, StoreError>;
}
