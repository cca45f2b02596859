//! Exchange, refresh and logout.

use crate::error::AuthError;
use crate::identity::IdentityBridge;
use crate::roles::RoleAuthority;
use sesame_core::{ClientMeta, RoleSet, User};
use sesame_store::{RefreshSecret, RefreshTokenStore, UserDirectory};
use sesame_token::TokenService;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_IDENTITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Session pair handed out by [`AuthOrchestrator::exchange`].
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub access_token: String,
    pub refresh_token: RefreshSecret,
    pub user: User,
    pub roles: RoleSet,
}

/// Result of [`AuthOrchestrator::refresh`]. `refresh_token` is set only when rotated.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub refresh_token: Option<RefreshSecret>,
    pub user_id: Uuid,
    pub roles: RoleSet,
}

pub struct AuthOrchestrator {
    identity: Arc<dyn IdentityBridge>,
    users: Arc<dyn UserDirectory>,
    roles: Arc<RoleAuthority>,
    tokens: Arc<TokenService>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    identity_timeout: Duration,
}

impl AuthOrchestrator {
    pub fn new(
        identity: Arc<dyn IdentityBridge>,
        users: Arc<dyn UserDirectory>,
        roles: Arc<RoleAuthority>,
        tokens: Arc<TokenService>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
    ) -> Self {
        Self {
            identity,
            users,
            roles,
            tokens,
            refresh_tokens,
            identity_timeout: DEFAULT_IDENTITY_TIMEOUT,
        }
    }

    /// Upper bound on the identity provider call.
    pub fn with_identity_timeout(mut self, timeout: Duration) -> Self {
        self.identity_timeout = timeout;
        self
    }

    /// Trade an external identity token for an access token and a refresh token.
    pub async fn exchange(
        &self,
        external_token: &str,
        meta: &ClientMeta,
        default_roles: &RoleSet,
        single_device: bool,
    ) -> Result<ExchangeOutcome, AuthError> {
        let claims =
            match tokio::time::timeout(self.identity_timeout, self.identity.verify(external_token))
                .await
            {
                Ok(Ok(claims)) => claims,
                Ok(Err(e)) => {
                    warn!(error = %e, "identity verification failed");
                    return Err(e.into());
                }
                Err(_) => {
                    warn!("identity verification timed out");
                    return Err(AuthError::IdentityVerificationFailed(
                        "timed out".to_string(),
                    ));
                }
            };

        // Committed before anything below reads it.
        let user = self.users.upsert(&claims, default_roles).await?;
        let roles = self.roles.resolve(user.id).await?;
        let access_token = self.tokens.mint(&user.id.to_string(), &roles, None)?;
        let issued = self
            .refresh_tokens
            .issue(user.id, None, meta, single_device)
            .await?;

        info!(user_id = %user.id, roles = ?roles.to_vec(), "exchange");
        Ok(ExchangeOutcome {
            access_token,
            refresh_token: issued.secret,
            user,
            roles,
        })
    }

    /// Mint a new access token from a refresh token, rotating it when `rotate` is set.
    pub async fn refresh(
        &self,
        raw_refresh_token: &str,
        rotate: bool,
        meta: &ClientMeta,
    ) -> Result<RefreshOutcome, AuthError> {
        let raw = raw_refresh_token.trim();
        if raw.is_empty() {
            return Err(AuthError::MissingRefreshToken);
        }

        let record = self.refresh_tokens.verify(raw).await?;
        let roles = self.roles.resolve(record.user_id).await?;
        let access_token = self
            .tokens
            .mint(&record.user_id.to_string(), &roles, None)?;

        let refresh_token = if rotate {
            Some(self.refresh_tokens.rotate(&record, meta).await?.secret)
        } else {
            None
        };

        info!(user_id = %record.user_id, rotated = rotate, "refresh");
        Ok(RefreshOutcome {
            access_token,
            refresh_token,
            user_id: record.user_id,
            roles,
        })
    }

    /// Revoke every refresh token of `user_id`. Outstanding access tokens stay valid until expiry.
    pub async fn logout(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let revoked = self.refresh_tokens.revoke_all(user_id).await?;
        info!(user_id = %user_id, revoked, "logout");
        Ok(revoked)
    }
}
