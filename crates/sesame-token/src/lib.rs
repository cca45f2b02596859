//! # sesame-token
//!
//! Access token handling for Sesame.
//!
//! This crate provides functionality for:
//! - Minting short-lived access tokens carrying a subject and a role snapshot
//! - Verifying signature, expiry and type of presented access tokens
//!
//! Access tokens are compact JWTs signed with a shared secret (HS256 by default).
//! They are self-contained: verification needs no store lookup, and they cannot
//! be revoked individually. Their short lifetime bounds exposure.
//!
//! The role snapshot is informational. Authorization decisions re-read roles
//! from the store on every guarded request.

pub mod claims;
pub mod error;
pub mod token;

pub use claims::{ACCESS_TOKEN_TYPE, AccessClaims};
pub use error::TokenError;
pub use token::TokenService;
