//! In-process stores with the same contracts as the SQLite ones.
//!
//! Meant as test doubles: nothing here survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use shared::types::{NewSession, Session, User};

use super::StoreError;
use super::credentials::CredentialStore;
use super::sessions::SessionStore;
use super::utils::get_timestamp;

#[derive(Default)]
struct UserTable {
    last_id: i64,
    by_username: HashMap<String, User>,
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    users: Mutex<UserTable>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.by_username.get(username).cloned())
    }

    async fn create(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        // Check and insert under one lock, like a UNIQUE constraint would.
        let mut table = self.users.lock().await;
        if table.by_username.contains_key(username) {
            return Err(StoreError::DuplicateUsername);
        }

        table.last_id += 1;
        let user = User {
            id: table.last_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: get_timestamp(),
        };
        table.by_username.insert(user.username.clone(), user.clone());
        Ok(user)
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: NewSession) -> Result<(), StoreError> {
        let stored = Session::from(&session);
        self.sessions.lock().await.insert(session.session_id, stored);
        Ok(())
    }

    async fn find(&self, session_id: &str, now: i64) -> Result<Option<Session>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .await
            .get(session_id)
            .filter(|s| !s.is_expired(now))
            .cloned())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions.lock().await.remove(session_id);
        Ok(())
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_enforces_uniqueness() {
        let store = MemoryCredentialStore::new();
        let first = store.create("alice", "h").await.unwrap();
        assert_eq!(first.id, 1);
        assert!(matches!(
            store.create("alice", "h").await,
            Err(StoreError::DuplicateUsername)
        ));
        assert_eq!(store.create("bob", "h").await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn memory_sessions_expire() {
        let store = MemorySessionStore::new();
        store
            .insert(NewSession {
                session_id: "s".into(),
                user_id: 1,
                username: "alice".into(),
                created_at: 0,
                expires_at: 10,
            })
            .await
            .unwrap();

        assert!(store.find("s", 5).await.unwrap().is_some());
        assert!(store.find("s", 10).await.unwrap().is_none());
        assert_eq!(store.purge_expired(10).await.unwrap(), 1);
        assert_eq!(store.len().await, 0);
    }
}
