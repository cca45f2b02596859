//! Per-request authorization guard.
//!
//! ```text
//! Unauthenticated -> TokenVerified -> UserLoaded -> RolesResolved -> Authorized | Forbidden
//! ```

use crate::error::AuthError;
use crate::roles::{RequestContext, RoleAuthority};
use sesame_core::{RoleSet, User};
use sesame_store::UserDirectory;
use sesame_token::{AccessClaims, TokenService};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// A user that passed the guard, with the roles that were checked.
#[derive(Debug, Clone)]
pub struct AuthorizedUser {
    pub user: User,
    /// Live roles from the store (not the token snapshot).
    pub roles: RoleSet,
    pub claims: AccessClaims,
}

/// Extract the credential from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingCredential)?.trim();
    let (scheme, token) = header
        .split_once(' ')
        .ok_or(AuthError::MissingCredential)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingCredential);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

pub struct AuthorizationGuard {
    tokens: Arc<TokenService>,
    users: Arc<dyn UserDirectory>,
    roles: Arc<RoleAuthority>,
}

impl AuthorizationGuard {
    pub fn new(
        tokens: Arc<TokenService>,
        users: Arc<dyn UserDirectory>,
        roles: Arc<RoleAuthority>,
    ) -> Self {
        Self {
            tokens,
            users,
            roles,
        }
    }

    /// Verify the access token and load its user.
    pub async fn authenticate(&self, token: &str) -> Result<(User, AccessClaims), AuthError> {
        let claims = self.tokens.verify(token).map_err(|e| {
            debug!(error = %e, "access token rejected");
            AuthError::from(e)
        })?;

        // A subject that is not one of our ids cannot name an existing user.
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::UserNotFound)?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok((user, claims))
    }

    /// Run the full guard for `bearer` (the raw `Authorization` header value).
    ///
    /// `required` is already normalized; an empty set admits any authenticated user.
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        bearer: Option<&str>,
        required: &RoleSet,
    ) -> Result<AuthorizedUser, AuthError> {
        let token = extract_bearer(bearer)?;
        let (user, claims) = self.authenticate(token).await?;
        let roles = self.roles.resolve_in(ctx, user.id).await?;

        let missing = required.missing_from(&roles);
        if !missing.is_empty() {
            warn!(
                request_id = %ctx.id(),
                user_id = %user.id,
                missing = ?missing,
                "forbidden"
            );
            return Err(AuthError::MissingRoles(missing));
        }

        Ok(AuthorizedUser {
            user,
            roles,
            claims,
        })
    }
}
