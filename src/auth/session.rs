use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Process-local session cache keyed by session id.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    pub async fn create(&self, user_name: &str) -> Session {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().simple().to_string(),
            user_name: user_name.to_string(),
            created_at: now,
            expires_at: now + self.ttl,
        };

        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        tracing::debug!(user_name = %user_name, "session created");
        session
    }

    /// Live session by id. Expired entries are evicted on lookup.
    pub async fn get(&self, id: &str) -> Option<Session> {
        let now = Utc::now();
        let session = self.sessions.read().await.get(id).cloned()?;

        if session.is_expired(now) {
            self.sessions.write().await.remove(id);
            return None;
        }
        Some(session)
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Number of stored sessions, expired ones included until purged.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops every expired session; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = SessionStore::new(60);
        let session = store.create("admin").await;

        let found = store.get(&session.id).await.unwrap();
        assert_eq!(found.user_name, "admin");
        assert!(store.get("unknown").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_evicted() {
        let store = SessionStore::new(0);
        let session = store.create("admin").await;

        assert!(store.get(&session.id).await.is_none());
        assert_eq!(store.purge_expired().await, 0);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SessionStore::new(60);
        let session = store.create("admin").await;

        assert_eq!(store.len().await, 1);
        assert!(store.remove(&session.id).await);
        assert!(!store.remove(&session.id).await);
        assert_eq!(store.len().await, 0);
    }
}
