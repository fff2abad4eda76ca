//! Cache-backed session storage.
//!
//! Session payloads are JSON documents under the session namespace, keyed by
//! session id. A secondary index under the login-sessions namespace maps a
//! user id to the ids of that user's live sessions, which is what makes
//! "log out everywhere" possible.
//!
//! The index is a JSON array updated with a read followed by a write. Two
//! logins of the same user racing each other can drop one id from the index;
//! the session itself stays valid and simply expires on its own TTL.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use reqscope_core::kv::{KeyValueStore, Namespace, Result};
use reqscope_core::session::{generate_session_id, SessionId, SessionPayload};

use crate::NamespacedCache;

/// Session persistence adapter for the serving layer.
#[derive(Clone)]
pub struct SessionStore {
    sessions: NamespacedCache,
    login_index: NamespacedCache,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>, global_prefix: &str) -> Self {
        Self {
            sessions: NamespacedCache::for_namespace(
                store.clone(),
                global_prefix,
                Namespace::Session,
            ),
            login_index: NamespacedCache::for_namespace(
                store,
                global_prefix,
                Namespace::LoginSessions,
            ),
        }
    }

    /// Loads the payload of `id`.
    ///
    /// A corrupt payload is logged by the cache and reported as no session.
    pub async fn load(&self, id: &SessionId) -> Result<Option<SessionPayload>> {
        self.sessions.get(id).await
    }

    /// Stores `payload` under `id`, exactly as given, with a fresh `ttl`.
    ///
    /// When the payload belongs to a logged-in user the id is recorded in
    /// that user's index, whose TTL slides along with the session.
    pub async fn save(&self, id: &SessionId, payload: &SessionPayload, ttl: Duration) -> Result<bool> {
        if !self.sessions.set(id, payload, ttl).await? {
            return Ok(false);
        }

        if let Some(user_id) = payload.login_id() {
            let mut ids = self.session_ids_for(user_id).await?;
            if !ids.contains(id) {
                ids.push(id.clone());
            }
            self.login_index.set(user_id, &ids, ttl).await?;
        }

        tracing::debug!(session_id = %id, "Session saved");
        Ok(true)
    }

    /// Deletes the session `id`. Destroying an absent session is a no-op.
    pub async fn destroy(&self, id: &SessionId) -> Result<()> {
        let login_id = self.load(id).await?.and_then(|p| p.login_id());

        self.sessions.delete(&[id]).await?;

        if let Some(user_id) = login_id {
            let mut ids = self.session_ids_for(user_id).await?;
            ids.retain(|existing| existing != id);
            if ids.is_empty() {
                self.login_index.delete(&[user_id]).await?;
            } else {
                let ttl = self.index_ttl(user_id).await?;
                self.login_index.set(user_id, &ids, ttl).await?;
            }
        }

        tracing::debug!(session_id = %id, "Session destroyed");
        Ok(())
    }

    /// Resets the TTL of `id` without rewriting it. Returns false when absent.
    pub async fn touch(&self, id: &SessionId, ttl: Duration) -> Result<bool> {
        let touched = self.sessions.expire(id, ttl).await?;
        if touched {
            if let Some(user_id) = self.load(id).await?.and_then(|p| p.login_id()) {
                self.login_index.expire(user_id, ttl).await?;
            }
        }
        Ok(touched)
    }

    /// Moves the payload of `id` to a freshly generated id.
    ///
    /// An absent session regenerates into an anonymous one.
    pub async fn regenerate(&self, id: &SessionId, ttl: Duration) -> Result<SessionId> {
        let payload = self
            .load(id)
            .await?
            .unwrap_or_else(|| SessionPayload::anonymous(Utc::now()));

        let new_id = generate_session_id();
        self.save(&new_id, &payload, ttl).await?;
        self.destroy(id).await?;

        tracing::debug!(old = %id, new = %new_id, "Session regenerated");
        Ok(new_id)
    }

    /// Ids of the sessions recorded for `user_id`.
    pub async fn session_ids_for(&self, user_id: i64) -> Result<Vec<SessionId>> {
        Ok(self.login_index.get(user_id).await?.unwrap_or_default())
    }

    /// Destroys every session recorded in the index of `user_id`.
    ///
    /// Returns how many ids the index held. Since the index can lose an id to
    /// a concurrent login, this is a count of recorded sessions, not a
    /// guarantee about how many were live.
    pub async fn destroy_all_for(&self, user_id: i64) -> Result<usize> {
        let ids = self.session_ids_for(user_id).await?;
        self.sessions.delete(&ids).await?;
        self.login_index.delete(&[user_id]).await?;

        tracing::info!(user_id, sessions = ids.len(), "Destroyed all sessions for user");
        Ok(ids.len())
    }

    // Remaining TTL of an index, falling back to a short grace period when the
    // index carries none (it is about to be rewritten anyway).
    async fn index_ttl(&self, user_id: i64) -> Result<Duration> {
        let secs = self.login_index.ttl(user_id).await?;
        Ok(Duration::from_secs(if secs > 0 { secs as u64 } else { 1 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use reqscope_core::session::{Session, UserView};

    const TTL: Duration = Duration::from_secs(3600);

    fn store() -> (SessionStore, MemoryStore) {
        let memory = MemoryStore::default();
        (SessionStore::new(Arc::new(memory.clone()), "test"), memory)
    }

    fn payload(user_id: i64) -> SessionPayload {
        let session = Session::new(
            user_id,
            UserView {
                user_name: format!("user-{user_id}"),
                phone: "555-0100".to_string(),
                email: format!("user-{user_id}@example.com"),
                is_admin: false,
            },
        )
        .with_rights(["test", "test1"]);
        SessionPayload::for_session(session, Utc::now())
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (sessions, _) = store();
        let id = SessionId::new("sid-1");
        let mut saved = payload(1);
        saved.last_seen_at = saved.created_at - chrono::Duration::hours(1);

        assert!(sessions.save(&id, &saved, TTL).await.unwrap());
        let loaded = sessions.load(&id).await.unwrap().unwrap();

        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_destroy_then_load_is_absent() {
        let (sessions, _) = store();
        let id = SessionId::new("sid-1");

        sessions.save(&id, &payload(1), TTL).await.unwrap();
        sessions.destroy(&id).await.unwrap();
        assert!(sessions.load(&id).await.unwrap().is_none());

        // Destroying again is fine.
        sessions.destroy(&id).await.unwrap();

        sessions.save(&id, &payload(2), TTL).await.unwrap();
        let loaded = sessions.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.login_id(), Some(2));
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_no_session() {
        let (sessions, memory) = store();
        memory
            .set("test:session:broken", "{\"data\":", None)
            .await
            .unwrap();

        assert!(sessions
            .load(&SessionId::new("broken"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_login_index_tracks_sessions() {
        let (sessions, _) = store();
        let a = SessionId::new("sid-a");
        let b = SessionId::new("sid-b");

        sessions.save(&a, &payload(7), TTL).await.unwrap();
        sessions.save(&b, &payload(7), TTL).await.unwrap();
        // Saving again does not duplicate the index entry.
        sessions.save(&a, &payload(7), TTL).await.unwrap();

        assert_eq!(
            sessions.session_ids_for(7).await.unwrap(),
            vec![a.clone(), b.clone()]
        );

        sessions.destroy(&a).await.unwrap();
        assert_eq!(sessions.session_ids_for(7).await.unwrap(), vec![b.clone()]);

        sessions.destroy(&b).await.unwrap();
        assert!(sessions.session_ids_for(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_session_is_not_indexed() {
        let (sessions, memory) = store();
        let id = SessionId::new("anon");

        sessions
            .save(&id, &SessionPayload::anonymous(Utc::now()), TTL)
            .await
            .unwrap();

        assert!(sessions.load(&id).await.unwrap().unwrap().data.is_none());
        assert_eq!(memory.len().await, 1);
    }

    #[tokio::test]
    async fn test_destroy_all_for_user() {
        let (sessions, _) = store();
        let ids: Vec<SessionId> = (0..3).map(|i| SessionId::new(format!("sid-{i}"))).collect();
        for id in &ids {
            sessions.save(id, &payload(9), TTL).await.unwrap();
        }
        let other = SessionId::new("other");
        sessions.save(&other, &payload(10), TTL).await.unwrap();

        assert_eq!(sessions.destroy_all_for(9).await.unwrap(), 3);

        for id in &ids {
            assert!(sessions.load(id).await.unwrap().is_none());
        }
        assert!(sessions.load(&other).await.unwrap().is_some());
        assert!(sessions.session_ids_for(9).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sliding_ttl() {
        let (sessions, _) = store();
        let id = SessionId::new("sid-1");
        let ttl = Duration::from_secs(100);

        sessions.save(&id, &payload(1), ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(80)).await;
        assert!(sessions.touch(&id, ttl).await.unwrap());

        tokio::time::advance(Duration::from_secs(80)).await;
        assert!(sessions.load(&id).await.unwrap().is_some());
        assert_eq!(sessions.session_ids_for(1).await.unwrap(), vec![id.clone()]);

        tokio::time::advance(Duration::from_secs(21)).await;
        assert!(sessions.load(&id).await.unwrap().is_none());
        assert!(!sessions.touch(&id, ttl).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_resets_ttl() {
        let (sessions, _) = store();
        let id = SessionId::new("sid-1");
        let ttl = Duration::from_secs(100);

        sessions.save(&id, &payload(1), ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(90)).await;
        sessions.save(&id, &payload(1), ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(90)).await;

        assert!(sessions.load(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_regenerate_moves_payload() {
        let (sessions, _) = store();
        let old = SessionId::new("old");
        sessions.save(&old, &payload(3), TTL).await.unwrap();

        let new = sessions.regenerate(&old, TTL).await.unwrap();

        assert_ne!(new, old);
        assert!(sessions.load(&old).await.unwrap().is_none());
        assert_eq!(
            sessions.load(&new).await.unwrap().unwrap().login_id(),
            Some(3)
        );
        assert_eq!(sessions.session_ids_for(3).await.unwrap(), vec![new]);
    }
}
