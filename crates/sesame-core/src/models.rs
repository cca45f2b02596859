//! Persisted data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A local user, keyed by the external provider's subject id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable local identifier.
    pub id: Uuid,

    /// Subject id assigned by the external identity provider. Immutable once set.
    pub external_subject: String,

    /// Email address, unique when present.
    pub email: Option<String>,

    pub email_verified: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// A named role (static reference data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

/// Metadata of a stored refresh token. The digest of the secret is never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Set once, never cleared.
    pub revoked_at: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

impl RefreshTokenRecord {
    /// A record is usable iff it is not revoked and `expires_at > now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// Client metadata recorded with a refresh token for audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

impl ClientMeta {
    pub fn new(user_agent: Option<String>, ip: Option<String>) -> Self {
        Self { user_agent, ip }
    }
}

/// Verified claims of an external identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalClaims {
    /// External subject id.
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

impl ExternalClaims {
    pub fn new(subject: impl Into<String>, email: Option<String>, email_verified: bool) -> Self {
        Self {
            subject: subject.into(),
            email,
            email_verified,
        }
    }

    /// Map a raw provider payload onto the fixed claim set.
    ///
    /// The subject comes from `user_id`, falling back to `sub`. Returns `None` when
    /// neither is a non-empty string.
    pub fn from_raw(raw: &Map<String, Value>) -> Option<Self> {
        let subject = ["user_id", "sub"]
            .iter()
            .filter_map(|key| raw.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())?
            .to_string();

        let email = raw
            .get("email")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let email_verified = raw
            .get("email_verified")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Some(Self {
            subject,
            email,
            email_verified,
        })
    }
}
