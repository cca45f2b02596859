//! Role resolution and administration.

use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use sesame_core::RoleSet;
use sesame_store::{RoleRepository, UserDirectory};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

/// State scoped to one request. Dropped with the request, so memoized roles never
/// outlive it.
#[derive(Debug)]
pub struct RequestContext {
    id: Uuid,
    roles: OnceCell<(Uuid, RoleSet)>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            roles: OnceCell::new(),
        }
    }

    /// Identifier for correlating log lines of one request.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Roles memoized for `user_id` in this request, if any.
    pub fn cached_roles(&self, user_id: Uuid) -> Option<&RoleSet> {
        self.roles
            .get()
            .filter(|(cached, _)| *cached == user_id)
            .map(|(_, roles)| roles)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleOperation {
    Grant,
    Revoke,
}

/// Result of an admin grant or revoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChange {
    pub user_id: Uuid,
    pub role: String,
    pub operation: RoleOperation,
    /// `false` when the grant already existed or the revoked role was not held.
    pub changed: bool,
}

/// Resolves role names from the store. No cross-request caching.
pub struct RoleAuthority {
    roles: Arc<dyn RoleRepository>,
    users: Arc<dyn UserDirectory>,
}

impl RoleAuthority {
    pub fn new(roles: Arc<dyn RoleRepository>, users: Arc<dyn UserDirectory>) -> Self {
        Self { roles, users }
    }

    /// Current role names of `user_id`, read from the store.
    pub async fn resolve(&self, user_id: Uuid) -> Result<RoleSet, AuthError> {
        Ok(self.roles.role_names(user_id).await?)
    }

    /// Like [`resolve`](Self::resolve), fetching at most once per request and user.
    pub async fn resolve_in(
        &self,
        ctx: &RequestContext,
        user_id: Uuid,
    ) -> Result<RoleSet, AuthError> {
        if let Some(roles) = ctx.cached_roles(user_id) {
            return Ok(roles.clone());
        }
        if ctx.roles.initialized() {
            // Memoized for a different user; never hand those out.
            return self.resolve(user_id).await;
        }

        let (cached, roles) = ctx
            .roles
            .get_or_try_init(|| async { Ok::<_, AuthError>((user_id, self.resolve(user_id).await?)) })
            .await?;
        if *cached != user_id {
            return self.resolve(user_id).await;
        }
        Ok(roles.clone())
    }

    pub async fn grant(&self, user_id: Uuid, role: &str) -> Result<RoleChange, AuthError> {
        self.change(user_id, role, RoleOperation::Grant).await
    }

    pub async fn revoke(&self, user_id: Uuid, role: &str) -> Result<RoleChange, AuthError> {
        self.change(user_id, role, RoleOperation::Revoke).await
    }

    async fn change(
        &self,
        user_id: Uuid,
        role: &str,
        operation: RoleOperation,
    ) -> Result<RoleChange, AuthError> {
        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(AuthError::EntityNotFound("user_not_found"));
        }
        let role = self
            .roles
            .find_role(role)
            .await?
            .ok_or(AuthError::EntityNotFound("role_not_found"))?;

        let changed = match operation {
            RoleOperation::Grant => self.roles.grant(user_id, role.id).await?,
            RoleOperation::Revoke => self.roles.revoke(user_id, role.id).await?,
        };

        info!(user_id = %user_id, role = %role.name, ?operation, changed, "role change");
        Ok(RoleChange {
            user_id,
            role: role.name,
            operation,
            changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use sesame_core::{ExternalClaims, Role};
    use sesame_store::{RefreshSecretHasher, SqliteStore, StoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts `role_names` calls on top of a real store.
    struct CountingRoles {
        inner: Arc<SqliteStore>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RoleRepository for CountingRoles {
        async fn role_names(&self, user_id: Uuid) -> Result<RoleSet, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.role_names(user_id).await
        }

        async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
            self.inner.find_role(name).await
        }

        async fn grant(&self, user_id: Uuid, role_id: i64) -> Result<bool, StoreError> {
            self.inner.grant(user_id, role_id).await
        }

        async fn revoke(&self, user_id: Uuid, role_id: i64) -> Result<bool, StoreError> {
            self.inner.revoke(user_id, role_id).await
        }
    }

    async fn setup() -> (RoleAuthority, Arc<CountingRoles>, Arc<SqliteStore>) {
        let hasher = RefreshSecretHasher::new("pepper").unwrap();
        let store = Arc::new(SqliteStore::in_memory(hasher, Duration::days(1)).await.unwrap());
        let counting = Arc::new(CountingRoles {
            inner: store.clone(),
            calls: AtomicUsize::new(0),
        });
        let authority = RoleAuthority::new(counting.clone(), store.clone());
        (authority, counting, store)
    }

    async fn new_user(store: &SqliteStore, subject: &str) -> Uuid {
        let defaults: RoleSet = ["client"].into_iter().collect();
        store
            .upsert(&ExternalClaims::new(subject, None, false), &defaults)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_resolve_in_memoizes_per_request() {
        let (authority, counting, store) = setup().await;
        let user = new_user(&store, "ext-1").await;

        let ctx = RequestContext::new();
        authority.resolve_in(&ctx, user).await.unwrap();
        authority.resolve_in(&ctx, user).await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

        // A new request reads the store again.
        authority.resolve_in(&RequestContext::new(), user).await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_memoized_roles_do_not_leak_across_users() {
        let (authority, _, store) = setup().await;
        let alice = new_user(&store, "ext-alice").await;
        let bob = new_user(&store, "ext-bob").await;
        authority.grant(alice, "admin").await.unwrap();

        let ctx = RequestContext::new();
        assert!(authority.resolve_in(&ctx, alice).await.unwrap().contains("admin"));
        assert!(!authority.resolve_in(&ctx, bob).await.unwrap().contains("admin"));
        assert!(ctx.cached_roles(bob).is_none());
    }

    #[tokio::test]
    async fn test_grant_is_visible_immediately() {
        let (authority, _, store) = setup().await;
        let user = new_user(&store, "ext-1").await;

        let granted = authority.grant(user, " PRO ").await.unwrap();
        assert_eq!(granted.role, "pro");
        assert_eq!(granted.operation, RoleOperation::Grant);
        assert!(granted.changed);
        assert!(authority.resolve(user).await.unwrap().contains("pro"));

        assert!(!authority.grant(user, "pro").await.unwrap().changed);
        assert!(authority.revoke(user, "pro").await.unwrap().changed);
        assert!(!authority.revoke(user, "pro").await.unwrap().changed);
    }

    #[tokio::test]
    async fn test_missing_user_or_role() {
        let (authority, _, store) = setup().await;
        let user = new_user(&store, "ext-1").await;

        assert_eq!(
            authority.grant(Uuid::new_v4(), "pro").await.unwrap_err().reason(),
            "user_not_found"
        );
        assert_eq!(
            authority.revoke(user, "wizard").await.unwrap_err().reason(),
            "role_not_found"
        );
    }

    #[test]
    fn test_role_change_serialization() {
        let change = RoleChange {
            user_id: Uuid::nil(),
            role: "pro".to_string(),
            operation: RoleOperation::Revoke,
            changed: false,
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["operation"], "revoke");
        assert_eq!(json["changed"], false);
    }
}
