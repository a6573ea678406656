//! Ephemeral session handles. Not durable: a restart drops them, while the
//! user's cursor and ledger survive in the key-value layer.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::UserId;
use crate::error::PracticeError;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Session {
    pub id: String,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    /// Refreshed on every successful lookup; expiry is measured from here.
    pub last_seen: DateTime<Utc>,
}

/// Session ids are `{user}:{yyyymmddHHMMSS}-{suffix}`; the suffix keeps two starts
/// within the same second apart.
fn session_id(user_id: &str, started_at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}:{}-{}", user_id, started_at.format("%Y%m%d%H%M%S"), &suffix[..8])
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Option<Duration>,
}

impl SessionStore {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), ttl }
    }

    fn expired(&self, s: &Session, now: DateTime<Utc>) -> bool {
        self.ttl.is_some_and(|ttl| now - s.last_seen >= ttl)
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn create(&self, user_id: &str) -> Session {
        let started_at = Utc::now();
        let session = Session {
            id: session_id(user_id, started_at),
            user_id: user_id.to_string(),
            started_at,
            last_seen: started_at,
        };
        self.sessions.write().await.insert(session.id.clone(), session.clone());
        debug!(target: "practice", session_id = %session.id, "Session created");
        session
    }

    /// Look up a live session owned by `user_id` and mark it as seen. Expired
    /// sessions are evicted, and another user's session is reported as not found.
    pub async fn get(&self, session_id: &str, user_id: &str) -> Result<Session, PracticeError> {
        self.get_at(session_id, user_id, Utc::now()).await
    }

    async fn get_at(&self, session_id: &str, user_id: &str, now: DateTime<Utc>) -> Result<Session, PracticeError> {
        let mut map = self.sessions.write().await;
        let expired = match map.get(session_id) {
            Some(s) => self.expired(s, now),
            None => return Err(PracticeError::SessionNotFound(session_id.to_string())),
        };
        if expired {
            map.remove(session_id);
            debug!(target: "practice", %session_id, "Session expired");
            return Err(PracticeError::SessionNotFound(session_id.to_string()));
        }
        match map.get_mut(session_id) {
            Some(s) if s.user_id == user_id => {
                s.last_seen = s.last_seen.max(now);
                Ok(s.clone())
            }
            _ => Err(PracticeError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Remove the session. Ending twice fails the second time.
    pub async fn remove(&self, session_id: &str, user_id: &str) -> Result<Session, PracticeError> {
        self.get(session_id, user_id).await?;
        self.sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| PracticeError::SessionNotFound(session_id.to_string()))
    }

    /// Drop every expired session; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.sessions.write().await;
        let before = map.len();
        map.retain(|_, s| !self.expired(s, now));
        before - map.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn create_get_remove() {
        let store = SessionStore::new(None);
        let s = store.create("alice").await;
        assert!(s.id.starts_with("alice:"));
        assert_eq!(store.get(&s.id, "alice").await.unwrap().id, s.id);
        store.remove(&s.id, "alice").await.unwrap();
        assert!(matches!(store.remove(&s.id, "alice").await, Err(PracticeError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn two_starts_get_distinct_ids() {
        let store = SessionStore::new(None);
        let a = store.create("u").await;
        let b = store.create("u").await;
        assert_ne!(a.id, b.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn other_users_cannot_see_session() {
        let store = SessionStore::new(None);
        let s = store.create("alice").await;
        assert!(matches!(store.get(&s.id, "mallory").await, Err(PracticeError::SessionNotFound(_))));
        assert!(store.remove(&s.id, "mallory").await.is_err());
        assert!(store.get(&s.id, "alice").await.is_ok());
    }

    #[tokio::test]
    async fn zero_ttl_expires_immediately() {
        let store = SessionStore::new(Some(Duration::zero()));
        let s = store.create("u").await;
        assert!(store.get(&s.id, "u").await.is_err());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn default_config_sessions_are_eventually_purged() {
        let ttl = AppConfig::default().session_ttl();
        let store = SessionStore::new(Some(ttl));
        for _ in 0..500 {
            store.create("u").await;
        }
        assert_eq!(store.purge_expired().await, 0);
        let later = Utc::now() + ttl + Duration::seconds(1);
        assert_eq!(store.purge_expired_at(later).await, 500);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn activity_keeps_session_alive() {
        let store = SessionStore::new(Some(Duration::hours(1)));
        let s = store.create("u").await;
        let t0 = s.started_at;
        assert!(store.get_at(&s.id, "u", t0 + Duration::minutes(50)).await.is_ok());
        // past started_at + ttl, but only 50 minutes idle
        assert!(store.get_at(&s.id, "u", t0 + Duration::minutes(100)).await.is_ok());
        assert!(store.get_at(&s.id, "u", t0 + Duration::minutes(200)).await.is_err());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn other_users_lookup_does_not_refresh() {
        let store = SessionStore::new(Some(Duration::hours(1)));
        let s = store.create("alice").await;
        let t0 = s.started_at;
        assert!(store.get_at(&s.id, "mallory", t0 + Duration::minutes(50)).await.is_err());
        assert!(store.get_at(&s.id, "alice", t0 + Duration::minutes(70)).await.is_err());
    }

    #[tokio::test]
    async fn purge_removes_expired() {
        let store = SessionStore::new(Some(Duration::zero()));
        store.create("u").await;
        store.create("v").await;
        assert_eq!(store.purge_expired().await, 2);
    }
}
