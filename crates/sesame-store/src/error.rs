//! Error types for the store crate.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No refresh token record matches the presented secret.
    #[error("unknown refresh token")]
    UnknownRefreshToken,

    /// The refresh token was rotated or logged out.
    #[error("refresh token revoked")]
    RevokedRefreshToken,

    /// The refresh token is past its expiry.
    #[error("refresh token expired")]
    ExpiredRefreshToken,

    /// Refresh token lifetimes must be at least one second.
    #[error("invalid refresh token ttl: {seconds}s")]
    InvalidTtl { seconds: i64 },

    /// Pepper is empty.
    #[error("refresh token pepper is empty")]
    EmptyPepper,

    /// A stored row could not be mapped onto the data model.
    #[error("corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// True if `err` is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
