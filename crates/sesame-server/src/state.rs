use crate::config::AppConfig;
use anyhow::Context;
use sesame_auth::{
    AuthOrchestrator, AuthorizationGuard, FirebaseIdentityBridge, IdentityBridge, RoleAuthority,
};
use sesame_core::{AuthConfig, RoleSet};
use sesame_store::{RefreshSecretHasher, SqliteStore};
use sesame_token::TokenService;
use std::{fs, path::Path, sync::Arc};

/// Shared application state. Everything in here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AuthOrchestrator>,
    pub guard: Arc<AuthorizationGuard>,
    pub roles: Arc<RoleAuthority>,
    /// Roles granted on first exchange.
    pub default_roles: RoleSet,
    /// Revoke other refresh tokens of a user on exchange.
    pub single_device: bool,
}

impl AppState {
    /// Resolve secrets, open the database and connect the identity provider.
    pub async fn init(cfg: &AppConfig) -> anyhow::Result<Self> {
        let secrets = cfg
            .auth
            .resolve_secrets()
            .context("resolving auth secrets")?;

        let db_path = Path::new(&cfg.server.database_path);
        ensure_parent_dir(db_path)?;
        let hasher = RefreshSecretHasher::new(&secrets.pepper)?;
        let store = SqliteStore::open(db_path, hasher, cfg.auth.refresh.ttl()).await?;

        let tokens = TokenService::from_config(&cfg.auth.token, &secrets.signing_secret)?;

        // One client for the whole process, handed to the bridge explicitly.
        let http = reqwest::Client::builder()
            .timeout(cfg.auth.identity.timeout())
            .build()?;
        let identity = FirebaseIdentityBridge::new(http, &cfg.auth.identity)?;

        Ok(Self::from_parts(
            Arc::new(store),
            Arc::new(tokens),
            Arc::new(identity),
            &cfg.auth,
        ))
    }

    /// Wire the auth layer over an already opened store.
    pub fn from_parts(
        store: Arc<SqliteStore>,
        tokens: Arc<TokenService>,
        identity: Arc<dyn IdentityBridge>,
        auth: &AuthConfig,
    ) -> Self {
        let roles = Arc::new(RoleAuthority::new(store.clone(), store.clone()));
        let orchestrator = AuthOrchestrator::new(
            identity,
            store.clone(),
            roles.clone(),
            tokens.clone(),
            store.clone(),
        )
        .with_identity_timeout(auth.identity.timeout());
        let guard = AuthorizationGuard::new(tokens, store, roles.clone());

        Self {
            orchestrator: Arc::new(orchestrator),
            guard: Arc::new(guard),
            roles,
            default_roles: auth.default_roles.iter().collect(),
            single_device: auth.refresh.single_device,
        }
    }
}

fn ensure_parent_dir(file_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Ok(())
}
