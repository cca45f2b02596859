//! [`RefreshTokenStore`] for SQLite.

use super::{SqliteStore, timestamp};
use crate::error::StoreError;
use crate::repository::{IssuedRefreshToken, RefreshTokenStore};
use crate::secret::RefreshSecret;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sesame_core::{ClientMeta, RefreshTokenRecord};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

type RecordRow = (
    Uuid,
    Uuid,
    i64,
    i64,
    Option<i64>,
    Option<String>,
    Option<String>,
);

fn record_from_row(row: RecordRow) -> Result<RefreshTokenRecord, StoreError> {
    let (id, user_id, issued_at, expires_at, revoked_at, user_agent, ip) = row;
    Ok(RefreshTokenRecord {
        id,
        user_id,
        issued_at: timestamp("refresh_tokens", issued_at)?,
        expires_at: timestamp("refresh_tokens", expires_at)?,
        revoked_at: revoked_at
            .map(|seconds| timestamp("refresh_tokens", seconds))
            .transpose()?,
        user_agent,
        ip,
    })
}

/// Classify a record that is not usable at `now`. Revocation is reported before expiry.
fn unusable(revoked_at: Option<i64>, expires_at: i64, now: i64) -> Option<StoreError> {
    if revoked_at.is_some() {
        Some(StoreError::RevokedRefreshToken)
    } else if expires_at <= now {
        Some(StoreError::ExpiredRefreshToken)
    } else {
        None
    }
}

impl SqliteStore {
    /// Insert a new record inside `tx`.
    async fn insert_refresh_token(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        user_id: Uuid,
        ttl: Duration,
        meta: &ClientMeta,
        now: i64,
    ) -> Result<IssuedRefreshToken, StoreError> {
        if ttl.num_seconds() < 1 {
            return Err(StoreError::InvalidTtl {
                seconds: ttl.num_seconds(),
            });
        }

        let secret = RefreshSecret::generate();
        let id = Uuid::new_v4();
        let expires_at = now.saturating_add(ttl.num_seconds());

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, user_agent, ip, issued_at, expires_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(self.hasher.digest(secret.expose()))
        .bind(meta.user_agent.as_deref())
        .bind(meta.ip.as_deref())
        .bind(now)
        .bind(expires_at)
        .execute(&mut **tx)
        .await?;

        let record = record_from_row((
            id,
            user_id,
            now,
            expires_at,
            None,
            meta.user_agent.clone(),
            meta.ip.clone(),
        ))?;
        Ok(IssuedRefreshToken { secret, record })
    }

    async fn revoke_usable(
        tx: &mut Transaction<'_, Sqlite>,
        user_id: Uuid,
        now: i64,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? \
             WHERE user_id = ? AND revoked_at IS NULL AND expires_at > ?",
        )
        .bind(now)
        .bind(user_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RefreshTokenStore for SqliteStore {
    async fn issue(
        &self,
        user_id: Uuid,
        ttl: Option<Duration>,
        meta: &ClientMeta,
        single_device: bool,
    ) -> Result<IssuedRefreshToken, StoreError> {
        let now = Utc::now().timestamp();
        let ttl = ttl.unwrap_or(self.refresh_ttl);
        let mut tx = self.begin_write().await?;

        if single_device {
            let revoked = Self::revoke_usable(&mut tx, user_id, now).await?;
            if revoked > 0 {
                debug!(user_id = %user_id, revoked, "revoked other devices");
            }
        }

        let issued = self
            .insert_refresh_token(&mut tx, user_id, ttl, meta, now)
            .await?;
        tx.commit().await?;

        info!(user_id = %user_id, token_id = %issued.record.id, "issued refresh token");
        Ok(issued)
    }

    async fn verify(&self, raw: &str) -> Result<RefreshTokenRecord, StoreError> {
        let row: Option<RecordRow> = sqlx::query_as(
            "SELECT id, user_id, issued_at, expires_at, revoked_at, user_agent, ip \
             FROM refresh_tokens WHERE token_hash = ?",
        )
        .bind(self.hasher.digest(raw))
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or(StoreError::UnknownRefreshToken)?;
        if let Some(err) = unusable(row.4, row.3, Utc::now().timestamp()) {
            warn!(token_id = %row.0, error = %err, "refresh token rejected");
            return Err(err);
        }

        record_from_row(row)
    }

    async fn rotate(
        &self,
        record: &RefreshTokenRecord,
        meta: &ClientMeta,
    ) -> Result<IssuedRefreshToken, StoreError> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;

        // Compare-and-set: only a still-usable record can be revoked here.
        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? \
             WHERE id = ? AND revoked_at IS NULL AND expires_at > ?",
        )
        .bind(now)
        .bind(record.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if revoked.rows_affected() == 0 {
            let current: Option<(Option<i64>, i64)> =
                sqlx::query_as("SELECT revoked_at, expires_at FROM refresh_tokens WHERE id = ?")
                    .bind(record.id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;

            let err = match current {
                None => StoreError::UnknownRefreshToken,
                Some((revoked_at, expires_at)) => unusable(revoked_at, expires_at, now)
                    .unwrap_or(StoreError::RevokedRefreshToken),
            };
            warn!(token_id = %record.id, error = %err, "refresh token rotation refused");
            return Err(err);
        }

        let issued = self
            .insert_refresh_token(&mut tx, record.user_id, self.refresh_ttl, meta, now)
            .await?;
        tx.commit().await?;

        info!(
            user_id = %record.user_id,
            old_token_id = %record.id,
            token_id = %issued.record.id,
            "rotated refresh token"
        );
        Ok(issued)
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;
        let revoked = Self::revoke_usable(&mut tx, user_id, now).await?;
        tx.commit().await?;

        info!(user_id = %user_id, revoked, "revoked refresh tokens");
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{file_store, store, user};
    use super::*;

    fn meta() -> ClientMeta {
        ClientMeta::new(Some("test-agent".to_string()), Some("203.0.113.7".to_string()))
    }

    async fn hash_of(store: &SqliteStore, id: Uuid) -> String {
        let (hash,): (String,) = sqlx::query_as("SELECT token_hash FROM refresh_tokens WHERE id = ?")
            .bind(id)
            .fetch_one(store.pool())
            .await
            .unwrap();
        hash
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let store = store().await;
        let user = user(&store, "ext-1").await;

        let issued = store.issue(user.id, None, &meta(), false).await.unwrap();
        assert_eq!(issued.record.user_id, user.id);
        assert_eq!(
            issued.record.expires_at - issued.record.issued_at,
            Duration::days(30)
        );
        assert_eq!(issued.record.user_agent.as_deref(), Some("test-agent"));

        let verified = store.verify(issued.secret.expose()).await.unwrap();
        assert_eq!(verified, issued.record);
    }

    #[tokio::test]
    async fn test_raw_secret_is_never_stored() {
        let store = store().await;
        let user = user(&store, "ext-1").await;
        let issued = store.issue(user.id, None, &meta(), false).await.unwrap();

        let hash = hash_of(&store, issued.record.id).await;
        assert_ne!(hash, issued.secret.expose());
        assert_eq!(hash, store.hasher.digest(issued.secret.expose()));
    }

    #[tokio::test]
    async fn test_unknown_secret() {
        let store = store().await;
        assert!(matches!(
            store.verify("not-a-real-secret").await,
            Err(StoreError::UnknownRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_invalid_ttl() {
        let store = store().await;
        let user = user(&store, "ext-1").await;
        assert!(matches!(
            store
                .issue(user.id, Some(Duration::zero()), &meta(), false)
                .await,
            Err(StoreError::InvalidTtl { seconds: 0 })
        ));
    }

    #[tokio::test]
    async fn test_expired_and_revoked_ordering() {
        let store = store().await;
        let user = user(&store, "ext-1").await;
        let issued = store.issue(user.id, None, &meta(), false).await.unwrap();

        // Push expiry into the past.
        sqlx::query("UPDATE refresh_tokens SET issued_at = 100, expires_at = 200 WHERE id = ?")
            .bind(issued.record.id)
            .execute(store.pool())
            .await
            .unwrap();
        assert!(matches!(
            store.verify(issued.secret.expose()).await,
            Err(StoreError::ExpiredRefreshToken)
        ));

        // Revoked and expired reports revoked.
        sqlx::query("UPDATE refresh_tokens SET revoked_at = 150 WHERE id = ?")
            .bind(issued.record.id)
            .execute(store.pool())
            .await
            .unwrap();
        assert!(matches!(
            store.verify(issued.secret.expose()).await,
            Err(StoreError::RevokedRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_rotation_invalidates_old_secret() {
        let store = store().await;
        let user = user(&store, "ext-1").await;
        let old = store.issue(user.id, None, &meta(), false).await.unwrap();

        let record = store.verify(old.secret.expose()).await.unwrap();
        let new = store.rotate(&record, &meta()).await.unwrap();

        assert_ne!(new.secret, old.secret);
        assert_eq!(new.record.user_id, user.id);
        assert!(matches!(
            store.verify(old.secret.expose()).await,
            Err(StoreError::RevokedRefreshToken)
        ));
        assert_eq!(store.verify(new.secret.expose()).await.unwrap(), new.record);
    }

    #[tokio::test]
    async fn test_rotating_revoked_record_changes_nothing() {
        let store = store().await;
        let user = user(&store, "ext-1").await;
        let old = store.issue(user.id, None, &meta(), false).await.unwrap();
        store.rotate(&old.record, &meta()).await.unwrap();

        assert!(matches!(
            store.rotate(&old.record, &meta()).await,
            Err(StoreError::RevokedRefreshToken)
        ));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_concurrent_rotation_has_one_winner() {
        let store = store().await;
        let user = user(&store, "ext-1").await;
        let old = store.issue(user.id, None, &meta(), false).await.unwrap();
        let record = store.verify(old.secret.expose()).await.unwrap();

        let meta = meta();
        let attempts = (0..8).map(|_| store.rotate(&record, &meta));
        let results = futures::future::join_all(attempts).await;

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, StoreError::RevokedRefreshToken))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotation_on_file_database() {
        let (_dir, store) = file_store().await;
        let user = user(&store, "ext-1").await;

        for _ in 0..10 {
            let old = store.issue(user.id, None, &meta(), false).await.unwrap();
            let record = store.verify(old.secret.expose()).await.unwrap();

            let tasks: Vec<_> = (0..8)
                .map(|_| {
                    let store = store.clone();
                    let record = record.clone();
                    tokio::spawn(async move { store.rotate(&record, &meta()).await })
                })
                .collect();

            let mut winners = 0;
            for task in tasks {
                match task.await.unwrap() {
                    Ok(_) => winners += 1,
                    Err(StoreError::RevokedRefreshToken) => {}
                    Err(e) => panic!("unexpected rotation error: {e}"),
                }
            }
            assert_eq!(winners, 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_single_device_issue_leaves_one_usable() {
        let (_dir, store) = file_store().await;
        let user_id = user(&store, "ext-1").await.id;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.issue(user_id, None, &meta(), true).await })
            })
            .collect();

        let mut issued = Vec::new();
        for task in tasks {
            issued.push(task.await.unwrap().unwrap());
        }

        let mut usable = 0;
        for token in &issued {
            if store.verify(token.secret.expose()).await.is_ok() {
                usable += 1;
            }
        }
        assert_eq!(usable, 1);
    }

    #[tokio::test]
    async fn test_single_device_revokes_others() {
        let store = store().await;
        let user = user(&store, "ext-1").await;
        let laptop = store.issue(user.id, None, &meta(), false).await.unwrap();
        let phone = store.issue(user.id, None, &meta(), false).await.unwrap();

        let tablet = store.issue(user.id, None, &meta(), true).await.unwrap();

        for old in [&laptop, &phone] {
            assert!(matches!(
                store.verify(old.secret.expose()).await,
                Err(StoreError::RevokedRefreshToken)
            ));
        }
        assert!(store.verify(tablet.secret.expose()).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_all_counts_only_usable() {
        let store = store().await;
        let user = user(&store, "ext-1").await;
        let other = super::super::test_support::user(&store, "ext-2").await;

        let first = store.issue(user.id, None, &meta(), false).await.unwrap();
        store.issue(user.id, None, &meta(), false).await.unwrap();
        store.rotate(&first.record, &meta()).await.unwrap();
        let untouched = store.issue(other.id, None, &meta(), false).await.unwrap();

        assert_eq!(store.revoke_all(user.id).await.unwrap(), 2);
        assert_eq!(store.revoke_all(user.id).await.unwrap(), 0);
        assert!(store.verify(untouched.secret.expose()).await.is_ok());
    }
}
