//! End-to-end session scenarios against in-memory and file-backed stores.

use async_trait::async_trait;
use chrono::Duration;
use sesame_auth::{
    AuthError, AuthOrchestrator, AuthorizationGuard, IdentityBridge, IdentityError,
    RequestContext, RoleAuthority, StaticIdentityBridge,
};
use sesame_core::{ClientMeta, ExternalClaims, RoleSet};
use sesame_store::{RefreshSecretHasher, SqliteStore};
use sesame_token::TokenService;
use std::sync::Arc;

struct Harness {
    orchestrator: AuthOrchestrator,
    guard: AuthorizationGuard,
    roles: Arc<RoleAuthority>,
}

fn identity() -> StaticIdentityBridge {
    StaticIdentityBridge::new()
        .with_token(
            "alice-token",
            ExternalClaims::new("ext-alice", Some("alice@example.com".into()), true),
        )
        .with_token(
            "bob-token",
            ExternalClaims::new("ext-bob", Some("bob@example.com".into()), false),
        )
}

fn hasher() -> RefreshSecretHasher {
    RefreshSecretHasher::new("refresh-pepper").unwrap()
}

async fn harness_with(identity: Arc<dyn IdentityBridge>) -> Harness {
    let store = SqliteStore::in_memory(hasher(), Duration::days(30)).await.unwrap();
    harness_on(store, identity)
}

fn harness_on(store: SqliteStore, identity: Arc<dyn IdentityBridge>) -> Harness {
    let store = Arc::new(store);
    let tokens =
        Arc::new(TokenService::new("signing-secret", "HS256", Duration::minutes(15)).unwrap());
    let roles = Arc::new(RoleAuthority::new(store.clone(), store.clone()));

    Harness {
        orchestrator: AuthOrchestrator::new(
            identity,
            store.clone(),
            roles.clone(),
            tokens.clone(),
            store.clone(),
        ),
        guard: AuthorizationGuard::new(tokens, store, roles.clone()),
        roles,
    }
}

async fn harness() -> Harness {
    harness_with(Arc::new(identity())).await
}

fn defaults() -> RoleSet {
    ["client"].into_iter().collect()
}

fn meta() -> ClientMeta {
    ClientMeta::new(Some("scenario-agent".into()), Some("198.51.100.4".into()))
}

#[tokio::test]
async fn exchange_creates_then_reuses_user() {
    let h = harness().await;

    let first = h
        .orchestrator
        .exchange("alice-token", &meta(), &defaults(), false)
        .await
        .unwrap();
    assert!(!first.access_token.is_empty());
    assert!(!first.refresh_token.expose().is_empty());
    assert_eq!(first.user.email.as_deref(), Some("alice@example.com"));
    assert_eq!(first.roles, defaults());

    let second = h
        .orchestrator
        .exchange("alice-token", &meta(), &defaults(), false)
        .await
        .unwrap();
    assert_eq!(second.user.id, first.user.id);
    assert_ne!(second.refresh_token, first.refresh_token);
}

#[tokio::test]
async fn exchange_with_rejected_identity() {
    let h = harness().await;
    let err = h
        .orchestrator
        .exchange("forged-token", &meta(), &defaults(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::IdentityVerificationFailed(_)));
    assert_eq!(err.status(), 401);
}

struct StalledIdentity;

#[async_trait]
impl IdentityBridge for StalledIdentity {
    async fn verify(&self, _raw: &str) -> Result<ExternalClaims, IdentityError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn exchange_times_out_on_stalled_identity_provider() {
    let h = harness_with(Arc::new(StalledIdentity)).await;
    let orchestrator = h
        .orchestrator
        .with_identity_timeout(std::time::Duration::from_millis(50));

    let err = orchestrator
        .exchange("anything", &meta(), &defaults(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::IdentityVerificationFailed(_)));
}

#[tokio::test]
async fn guarded_route_sees_grant_without_new_token() {
    let h = harness().await;
    let session = h
        .orchestrator
        .exchange("bob-token", &meta(), &defaults(), false)
        .await
        .unwrap();
    let header = format!("Bearer {}", session.access_token);
    let pro: RoleSet = ["pro"].into_iter().collect();

    let err = h
        .guard
        .authorize(&RequestContext::new(), Some(header.as_str()), &pro)
        .await
        .unwrap_err();
    assert_eq!(err.status(), 403);
    assert_eq!(err.reason(), "missing_roles:pro");

    let change = h.roles.grant(session.user.id, "pro").await.unwrap();
    assert!(change.changed);

    let authorized = h
        .guard
        .authorize(&RequestContext::new(), Some(header.as_str()), &pro)
        .await
        .unwrap();
    assert!(authorized.roles.contains("pro"));
    // The token snapshot is unchanged; the live roles decided.
    assert!(!authorized.claims.role_set().contains("pro"));
}

#[tokio::test]
async fn refresh_without_rotation_keeps_token_usable() {
    let h = harness().await;
    let session = h
        .orchestrator
        .exchange("alice-token", &meta(), &defaults(), false)
        .await
        .unwrap();
    let raw = session.refresh_token.expose();

    for _ in 0..2 {
        let outcome = h.orchestrator.refresh(raw, false, &meta()).await.unwrap();
        assert!(outcome.refresh_token.is_none());
        assert_eq!(outcome.user_id, session.user.id);
        assert_eq!(outcome.roles, defaults());
    }
}

#[tokio::test]
async fn reuse_after_rotation_fails() {
    let h = harness().await;
    let session = h
        .orchestrator
        .exchange("alice-token", &meta(), &defaults(), false)
        .await
        .unwrap();
    let original = session.refresh_token.expose();

    let rotated = h.orchestrator.refresh(original, true, &meta()).await.unwrap();
    let next = rotated.refresh_token.unwrap();

    let replay = h.orchestrator.refresh(original, true, &meta()).await.unwrap_err();
    assert!(matches!(
        replay,
        AuthError::RevokedRefreshToken | AuthError::UnknownRefreshToken
    ));

    assert!(h.orchestrator.refresh(next.expose(), true, &meta()).await.is_ok());
}

#[tokio::test]
async fn concurrent_refresh_with_rotation_has_one_winner() {
    let h = harness().await;
    let session = h
        .orchestrator
        .exchange("alice-token", &meta(), &defaults(), false)
        .await
        .unwrap();
    let raw = session.refresh_token.expose();
    let meta = meta();

    let attempts = (0..4).map(|_| h.orchestrator.refresh(raw, true, &meta));
    let results = futures::future::join_all(attempts).await;

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
        e,
        AuthError::RevokedRefreshToken | AuthError::UnknownRefreshToken
    )));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_on_file_database() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = SqliteStore::open(&dir.path().join("auth.db"), hasher(), Duration::days(30))
        .await
        .unwrap();
    let orchestrator = Arc::new(harness_on(store, Arc::new(identity())).orchestrator);

    let exchanges: Vec<_> = ["alice-token", "bob-token", "alice-token", "bob-token"]
        .into_iter()
        .map(|token| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .exchange(token, &meta(), &defaults(), false)
                    .await
            })
        })
        .collect();
    let mut sessions = Vec::new();
    for task in exchanges {
        sessions.push(task.await.unwrap().unwrap());
    }
    assert_eq!(sessions[0].user.id, sessions[2].user.id);
    assert_eq!(sessions[1].user.id, sessions[3].user.id);
    assert_ne!(sessions[0].user.id, sessions[1].user.id);

    let raw = sessions[0].refresh_token.expose().to_string();
    let refreshes: Vec<_> = (0..8)
        .map(|_| {
            let orchestrator = orchestrator.clone();
            let raw = raw.clone();
            tokio::spawn(async move { orchestrator.refresh(&raw, true, &meta()).await })
        })
        .collect();

    let mut winners = 0;
    for task in refreshes {
        match task.await.unwrap() {
            Ok(_) => winners += 1,
            Err(AuthError::RevokedRefreshToken) => {}
            Err(e) => panic!("unexpected refresh error: {e}"),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn empty_and_unknown_refresh_tokens() {
    let h = harness().await;
    assert!(matches!(
        h.orchestrator.refresh("   ", true, &meta()).await,
        Err(AuthError::MissingRefreshToken)
    ));
    let err = h
        .orchestrator
        .refresh("never-issued", true, &meta())
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "refresh_unknown");
}

#[tokio::test]
async fn logout_revokes_refresh_tokens_only() {
    let h = harness().await;
    let laptop = h
        .orchestrator
        .exchange("alice-token", &meta(), &defaults(), false)
        .await
        .unwrap();
    let phone = h
        .orchestrator
        .exchange("alice-token", &meta(), &defaults(), false)
        .await
        .unwrap();

    assert_eq!(h.orchestrator.logout(laptop.user.id).await.unwrap(), 2);
    assert_eq!(h.orchestrator.logout(laptop.user.id).await.unwrap(), 0);

    for session in [&laptop, &phone] {
        assert!(matches!(
            h.orchestrator
                .refresh(session.refresh_token.expose(), false, &meta())
                .await,
            Err(AuthError::RevokedRefreshToken)
        ));
    }

    // The access token lives on until it expires.
    let header = format!("Bearer {}", laptop.access_token);
    assert!(
        h.guard
            .authorize(&RequestContext::new(), Some(header.as_str()), &RoleSet::new())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn single_device_exchange_revokes_previous_sessions() {
    let h = harness().await;
    let old = h
        .orchestrator
        .exchange("alice-token", &meta(), &defaults(), false)
        .await
        .unwrap();
    let new = h
        .orchestrator
        .exchange("alice-token", &meta(), &defaults(), true)
        .await
        .unwrap();

    assert!(matches!(
        h.orchestrator
            .refresh(old.refresh_token.expose(), false, &meta())
            .await,
        Err(AuthError::RevokedRefreshToken)
    ));
    assert!(
        h.orchestrator
            .refresh(new.refresh_token.expose(), false, &meta())
            .await
            .is_ok()
    );
}
