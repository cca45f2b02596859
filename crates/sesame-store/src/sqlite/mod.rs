//! SQLite-backed store.

mod refresh;
mod roles;
mod users;

use crate::error::StoreError;
use crate::secret::RefreshSecretHasher;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::Path;
use std::str::FromStr;

/// One pool shared by the user directory, role repository and refresh token store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    hasher: RefreshSecretHasher,
    refresh_ttl: Duration,
}

impl SqliteStore {
    /// Wrap an already migrated pool.
    pub fn new(pool: SqlitePool, hasher: RefreshSecretHasher, refresh_ttl: Duration) -> Self {
        Self {
            pool,
            hasher,
            refresh_ttl,
        }
    }

    /// Open (creating if missing) the database file at `path` and apply migrations.
    pub async fn open(
        path: &Path,
        hasher: RefreshSecretHasher,
        refresh_ttl: Duration,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.display(), "opened auth database");
        Self::migrated(pool, hasher, refresh_ttl).await
    }

    /// Private in-memory database, migrated and seeded.
    pub async fn in_memory(
        hasher: RefreshSecretHasher,
        refresh_ttl: Duration,
    ) -> Result<Self, StoreError> {
        // Every connection to `:memory:` is a separate database, so pin exactly one.
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::migrated(pool, hasher, refresh_ttl).await
    }

    async fn migrated(
        pool: SqlitePool,
        hasher: RefreshSecretHasher,
        refresh_ttl: Duration,
    ) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool, hasher, refresh_ttl))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction that holds the write lock from its first statement.
    ///
    /// A deferred transaction that reads before writing cannot upgrade once
    /// another connection has committed in WAL mode, and fails with
    /// `SQLITE_BUSY` without waiting on the busy timeout.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Default lifetime of issued and rotated refresh tokens.
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

pub(crate) fn timestamp(
    table: &'static str,
    seconds: i64,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| StoreError::CorruptRow {
        table,
        reason: format!("timestamp out of range: {seconds}"),
    })
}
