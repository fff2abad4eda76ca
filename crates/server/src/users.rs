//! In-memory user directory.
//!
//! Development stand-in for a user table: records live in process memory and
//! passwords are compared as given. It exists so the login flow has someone to
//! log in as; do not point real credentials at it.

use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use tokio::sync::RwLock;

use reqscope_core::kv::KvError;
use reqscope_core::session::{Session, UserView};
use reqscope_store::{Auditable, PersistenceHooks};

/// Table name, also the name of the id sequence.
pub const USERS_TABLE: &str = "users";

/// Rights granted to every session at login.
pub const DEFAULT_RIGHTS: [&str; 2] = ["test", "test1"];

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Option<i64>,
    pub user_name: String,
    #[serde(skip)]
    pub password: String,
    pub phone: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: Option<i64>,
    pub updated_at: i64,
    pub created_by: i64,
    pub updated_by: i64,
    pub deleted_by: i64,
}

impl UserRecord {
    pub fn view(&self) -> UserView {
        UserView {
            user_name: self.user_name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            is_admin: self.is_admin,
        }
    }

    pub fn password_matches(&self, password: &str) -> bool {
        self.password == password
    }

    /// Session document for a login of this user.
    pub fn session(&self) -> Option<Session> {
        self.id
            .map(|id| Session::new(id, self.view()).with_rights(DEFAULT_RIGHTS))
    }
}

impl Auditable for UserRecord {
    fn id(&self) -> Option<i64> {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
    fn created_at(&self) -> Option<i64> {
        self.created_at
    }
    fn set_created_at(&mut self, at: i64) {
        self.created_at = Some(at);
    }
    fn set_updated_at(&mut self, at: i64) {
        self.updated_at = at;
    }
    fn set_created_by(&mut self, user_id: i64) {
        self.created_by = user_id;
    }
    fn set_updated_by(&mut self, user_id: i64) {
        self.updated_by = user_id;
    }
    fn set_deleted_by(&mut self, user_id: i64) {
        self.deleted_by = user_id;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("user {0} already exists")]
    Exists(String),
    #[error(transparent)]
    Store(#[from] KvError),
}

/// User records keyed by user name.
#[derive(Clone, Default)]
pub struct UserDirectory {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new user, minting its id through `hooks`.
    ///
    /// The first user registered becomes an administrator.
    pub async fn register(
        &self,
        hooks: &PersistenceHooks,
        mut record: UserRecord,
    ) -> Result<UserRecord, RegisterError> {
        record.user_name = record.user_name.trim().to_string();

        // Held across the id minting so two registrations of one name cannot
        // both pass the existence check.
        let mut users = self.users.write().await;
        if users.contains_key(&record.user_name) {
            return Err(RegisterError::Exists(record.user_name));
        }

        hooks.before_insert(USERS_TABLE, &mut record).await?;
        record.is_admin = users.is_empty();

        users.insert(record.user_name.clone(), record.clone());
        tracing::info!(user_id = ?record.id, user_name = %record.user_name, "Registered user");
        Ok(record)
    }

    pub async fn find_by_name(&self, user_name: &str) -> Option<UserRecord> {
        self.users.read().await.get(user_name.trim()).cloned()
    }
}
