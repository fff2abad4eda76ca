use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cryptographically random session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Public profile fields copied into the session at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub user_name: String,
    pub phone: String,
    pub email: String,
    pub is_admin: bool,
}

/// Authenticated user session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Owner of the session.
    pub user_id: i64,
    /// User the requests act as. `None` means the owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_user_id: Option<i64>,
    #[serde(default)]
    pub rights: BTreeSet<String>,
    pub user: UserView,
}

impl Session {
    pub fn new(user_id: i64, user: UserView) -> Self {
        Self {
            user_id,
            operating_user_id: None,
            rights: BTreeSet::new(),
            user,
        }
    }

    pub fn with_rights<I, S>(mut self, rights: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rights = rights.into_iter().map(Into::into).collect();
        self
    }

    pub fn acting_as(mut self, user_id: i64) -> Self {
        self.operating_user_id = Some(user_id);
        self
    }

    /// The id writes are attributed to.
    pub fn actor_id(&self) -> i64 {
        self.operating_user_id.unwrap_or(self.user_id)
    }

    pub fn has_right(&self, right: &str) -> bool {
        self.rights.contains(right)
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }
}

/// Document persisted per session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    /// Logged-in user, absent for anonymous or logged-out sessions.
    #[serde(default)]
    pub data: Option<Session>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl SessionPayload {
    pub fn anonymous(now: DateTime<Utc>) -> Self {
        Self {
            data: None,
            created_at: now,
            last_seen_at: now,
        }
    }

    pub fn for_session(session: Session, now: DateTime<Utc>) -> Self {
        Self {
            data: Some(session),
            created_at: now,
            last_seen_at: now,
        }
    }

    /// Login identity used by the secondary index.
    pub fn login_id(&self) -> Option<i64> {
        self.data.as_ref().map(|s| s.user_id)
    }
}
