use async_trait::async_trait;
use tokio_rusqlite::rusqlite::{OptionalExtension, params};
use tokio_rusqlite::{Connection, rusqlite};

use shared::types::{NewSession, Session};

use super::StoreError;

/// Server-side session storage keyed by the opaque session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: NewSession) -> Result<(), StoreError>;

    /// Look up a session that is still valid at `now`. Expired rows are
    /// reported as absent.
    async fn find(&self, session_id: &str, now: i64) -> Result<Option<Session>, StoreError>;

    /// Delete a session. Deleting an unknown id is not an error.
    async fn delete(&self, session_id: &str) -> Result<(), StoreError>;

    /// Delete every session that expired at or before `now`.
    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError>;
}

#[derive(Clone)]
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn insert(&self, session: NewSession) -> Result<(), StoreError> {
        self.conn
            .call(move |conn: &mut rusqlite::Connection| {
                conn.execute(
                    "INSERT INTO sessions (session_id, user_id, username, created_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        session.session_id,
                        session.user_id,
                        session.username,
                        session.created_at,
                        session.expires_at,
                    ],
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await?;
        Ok(())
    }

    async fn find(&self, session_id: &str, now: i64) -> Result<Option<Session>, StoreError> {
        let session_id = session_id.to_string();

        let session = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                let mut stmt = conn.prepare(
                    "SELECT user_id, username, created_at, expires_at
                     FROM sessions WHERE session_id = ?1 AND expires_at > ?2",
                )?;

                let session = stmt
                    .query_row(params![session_id, now], |row: &rusqlite::Row| {
                        Ok(Session {
                            user_id: row.get(0)?,
                            username: row.get(1)?,
                            created_at: row.get(2)?,
                            expires_at: row.get(3)?,
                        })
                    })
                    .optional()?;

                Ok::<_, rusqlite::Error>(session)
            })
            .await?;

        Ok(session)
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let session_id = session_id.to_string();

        self.conn
            .call(move |conn: &mut rusqlite::Connection| {
                conn.execute(
                    "DELETE FROM sessions WHERE session_id = ?1",
                    params![session_id],
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError> {
        let count = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                let count =
                    conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
                Ok::<_, rusqlite::Error>(count)
            })
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::credentials::{CredentialStore, SqliteCredentialStore};
    use crate::database::open_database;

    async fn stores() -> (SqliteCredentialStore, SqliteSessionStore) {
        let conn = open_database(":memory:").await.unwrap();
        (
            SqliteCredentialStore::new(conn.clone()),
            SqliteSessionStore::new(conn),
        )
    }

    fn new_session(id: &str, user_id: i64, expires_at: i64) -> NewSession {
        NewSession {
            session_id: id.to_string(),
            user_id,
            username: "alice".to_string(),
            created_at: 0,
            expires_at,
        }
    }

    #[tokio::test]
    async fn inserted_session_is_found_until_expiry() {
        let (users, sessions) = stores().await;
        let user = users.create("alice", "h").await.unwrap();

        sessions.insert(new_session("abc", user.id, 100)).await.unwrap();

        let found = sessions.find("abc", 50).await.unwrap().unwrap();
        assert_eq!(found.user_id, user.id);
        assert_eq!(found.username, "alice");
        assert!(sessions.find("abc", 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (users, sessions) = stores().await;
        let user = users.create("alice", "h").await.unwrap();
        sessions.insert(new_session("abc", user.id, 100)).await.unwrap();

        sessions.delete("abc").await.unwrap();
        sessions.delete("abc").await.unwrap();
        assert!(sessions.find("abc", 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purge_removes_only_expired_rows() {
        let (users, sessions) = stores().await;
        let user = users.create("alice", "h").await.unwrap();
        sessions.insert(new_session("old", user.id, 10)).await.unwrap();
        sessions.insert(new_session("new", user.id, 1000)).await.unwrap();

        assert_eq!(sessions.purge_expired(500).await.unwrap(), 1);
        assert!(sessions.find("new", 500).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn session_for_unknown_user_is_rejected() {
        let (_users, sessions) = stores().await;
        assert!(sessions.insert(new_session("x", 999, 100)).await.is_err());
    }
}
