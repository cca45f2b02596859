//! # sesame-store
//!
//! Persistence for the Sesame token lifecycle.
//!
//! This crate provides:
//! - [`UserDirectory`]: upsert of local users keyed by external subject id, default role grants
//! - [`RoleRepository`]: role lookups and idempotent grant/revoke
//! - [`RefreshTokenStore`]: issue, verify, rotate and revoke opaque refresh tokens
//!
//! [`SqliteStore`] implements all three on one SQLite pool. Refresh secrets are stored only
//! as an HMAC-SHA256 digest keyed with a server-held pepper (see [`secret`]).

pub mod error;
pub mod repository;
pub mod secret;
pub mod sqlite;

pub use error::StoreError;
pub use repository::{IssuedRefreshToken, RefreshTokenStore, RoleRepository, UserDirectory};
pub use secret::{RefreshSecret, RefreshSecretHasher};
pub use sqlite::SqliteStore;
