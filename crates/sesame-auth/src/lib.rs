//! # sesame-auth
//!
//! Composes token signing, persistence and the external identity provider into
//! the session lifecycle.
//!
//! ## Flows
//!
//! ```text
//! exchange: IdentityBridge::verify -> UserDirectory::upsert -> RoleAuthority::resolve
//!           -> TokenService::mint + RefreshTokenStore::issue
//! refresh:  RefreshTokenStore::verify -> RoleAuthority::resolve -> TokenService::mint
//!           (+ RefreshTokenStore::rotate)
//! guard:    TokenService::verify -> UserDirectory::find_by_id -> RoleAuthority::resolve
//!           -> required roles check
//! ```
//!
//! Roles are always read from the store, never from the access token's snapshot, so
//! an admin grant or revoke takes effect on the next guarded request. A
//! [`RequestContext`] memoizes the roles for a single request only.
//!
//! ## Example
//!
//! ```ignore
//! let ctx = RequestContext::new();
//! let required: RoleSet = ["pro"].into_iter().collect();
//! let authorized = guard.authorize(&ctx, authorization_header, &required).await?;
//! println!("hello {}", authorized.user.id);
//! ```

pub mod error;
pub mod guard;
pub mod identity;
pub mod orchestrator;
pub mod roles;

pub use error::AuthError;
pub use guard::{AuthorizationGuard, AuthorizedUser, extract_bearer};
pub use identity::{FirebaseIdentityBridge, IdentityBridge, IdentityError, StaticIdentityBridge};
pub use orchestrator::{AuthOrchestrator, ExchangeOutcome, RefreshOutcome};
pub use roles::{RequestContext, RoleAuthority, RoleChange, RoleOperation};
