//! [`UserDirectory`] for SQLite.

use super::{SqliteStore, timestamp};
use crate::error::{StoreError, is_unique_violation};
use crate::repository::UserDirectory;
use async_trait::async_trait;
use chrono::Utc;
use sesame_core::{ExternalClaims, RoleSet, User};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

type UserRow = (Uuid, String, Option<String>, bool, i64, i64, Option<i64>);

const SELECT_USER: &str = "SELECT id, external_subject, email, email_verified, created_at, updated_at, last_login_at FROM users";

fn user_from_row(row: UserRow) -> Result<User, StoreError> {
    let (id, external_subject, email, email_verified, created_at, updated_at, last_login_at) = row;
    Ok(User {
        id,
        external_subject,
        email,
        email_verified,
        created_at: timestamp("users", created_at)?,
        updated_at: timestamp("users", updated_at)?,
        last_login_at: last_login_at
            .map(|seconds| timestamp("users", seconds))
            .transpose()?,
    })
}

/// True if `email` is held by a user other than `except`.
async fn email_taken(
    tx: &mut Transaction<'_, Sqlite>,
    email: &str,
    except: Option<Uuid>,
) -> Result<bool, StoreError> {
    let holder: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(holder.is_some_and(|(id,)| Some(id) != except))
}

impl SqliteStore {
    async fn create_user(
        tx: &mut Transaction<'_, Sqlite>,
        claims: &ExternalClaims,
        default_roles: &RoleSet,
        now: i64,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut email = claims.email.as_deref();
        if let Some(address) = email {
            if email_taken(tx, address, None).await? {
                warn!(
                    subject = %claims.subject,
                    "email already belongs to another user; creating user without email"
                );
                email = None;
            }
        }

        let id = Uuid::new_v4();
        let inserted = sqlx::query(
            "INSERT INTO users (id, external_subject, email, email_verified, created_at, updated_at, last_login_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) ON CONFLICT(external_subject) DO NOTHING",
        )
        .bind(id)
        .bind(&claims.subject)
        .bind(email)
        .bind(claims.email_verified)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        if inserted.rows_affected() == 0 {
            // Another exchange for the same subject won.
            return Ok(None);
        }

        for role in default_roles {
            let granted = sqlx::query(
                "INSERT OR IGNORE INTO user_roles (user_id, role_id) SELECT ?, id FROM roles WHERE name = ?",
            )
            .bind(id)
            .bind(role.as_str())
            .execute(&mut **tx)
            .await?;
            if granted.rows_affected() == 0 {
                warn!(role = %role, "default role does not exist; skipped");
            }
        }

        info!(user_id = %id, "created user");
        Ok(Some(id))
    }

    async fn sync_user(
        tx: &mut Transaction<'_, Sqlite>,
        existing: &User,
        claims: &ExternalClaims,
        now: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET email_verified = ?, last_login_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(claims.email_verified)
        .bind(now)
        .bind(now)
        .bind(existing.id)
        .execute(&mut **tx)
        .await?;

        let Some(email) = claims.email.as_deref() else {
            return Ok(());
        };
        if existing.email.as_deref() == Some(email) {
            return Ok(());
        }

        if email_taken(tx, email, Some(existing.id)).await? {
            warn!(user_id = %existing.id, "email already belongs to another user; keeping stored email");
            return Ok(());
        }

        match sqlx::query("UPDATE users SET email = ? WHERE id = ?")
            .bind(email)
            .bind(existing.id)
            .execute(&mut **tx)
            .await
        {
            Ok(_) => {
                debug!(user_id = %existing.id, "email resynchronized");
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => {
                warn!(user_id = %existing.id, "email already belongs to another user; keeping stored email");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_subject(
        tx: &mut Transaction<'_, Sqlite>,
        subject: &str,
    ) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("{SELECT_USER} WHERE external_subject = ?"))
                .bind(subject)
                .fetch_optional(&mut **tx)
                .await?;
        row.map(user_from_row).transpose()
    }
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn upsert(
        &self,
        claims: &ExternalClaims,
        default_roles: &RoleSet,
    ) -> Result<User, StoreError> {
        let now = Utc::now().timestamp();
        let mut tx = self.begin_write().await?;

        let existing = Self::find_by_subject(&mut tx, &claims.subject).await?;
        let user_id = match existing {
            Some(user) => {
                Self::sync_user(&mut tx, &user, claims, now).await?;
                user.id
            }
            None => match Self::create_user(&mut tx, claims, default_roles, now).await? {
                Some(id) => id,
                None => {
                    let user = Self::find_by_subject(&mut tx, &claims.subject)
                        .await?
                        .ok_or_else(|| StoreError::CorruptRow {
                            table: "users",
                            reason: "conflicting insert left no row".to_string(),
                        })?;
                    Self::sync_user(&mut tx, &user, claims, now).await?;
                    user.id
                }
            },
        };

        let row: UserRow = sqlx::query_as(&format!("{SELECT_USER} WHERE id = ?"))
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        user_from_row(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_USER} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(user_from_row).transpose()
    }
}
