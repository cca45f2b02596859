//! # sesame-core
//!
//! Types shared by every Sesame crate:
//!
//! - Configuration for access tokens, refresh tokens and the external identity provider
//! - The persisted data model (users, roles, refresh token records)
//! - [`RoleSet`], the normalized set of role names used for minting and guard checks
//!
//! ## Session Model
//!
//! | Credential | Issued By | Stored | Lifetime |
//! |------------|-----------|--------|----------|
//! | **Access token** | `sesame-token` | Never (self-contained, signed) | Minutes |
//! | **Refresh token** | `sesame-store` | Keyed digest only | Days, revocable, rotating |

pub mod config;
pub mod models;
pub mod roles;

pub use config::{AuthConfig, ConfigError, IdentityConfig, RefreshConfig, ResolvedSecrets, TokenConfig};
pub use models::{ClientMeta, ExternalClaims, RefreshTokenRecord, Role, User};
pub use roles::RoleSet;
