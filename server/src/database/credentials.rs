use async_trait::async_trait;
use tokio_rusqlite::rusqlite::{OptionalExtension, params};
use tokio_rusqlite::{Connection, rusqlite};
use tracing::info;

use shared::types::User;

use super::StoreError;
use super::utils::get_timestamp;

/// Durable mapping from username to credential record.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Exact, case-sensitive lookup. A miss is `Ok(None)`, not an error.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new record. Fails with [`StoreError::DuplicateUsername`] when
    /// the username is already taken, however recently.
    async fn create(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;
}

/// SQLite-backed credential store.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    conn: Connection,
}

impl SqliteCredentialStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let username = username.to_string();

        let user = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                let mut stmt = conn.prepare(
                    "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
                )?;

                let user = stmt
                    .query_row(params![username], |row: &rusqlite::Row| {
                        Ok(User {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            password_hash: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    })
                    .optional()?;

                Ok::<_, rusqlite::Error>(user)
            })
            .await?;

        Ok(user)
    }

    async fn create(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let user = User {
            id: 0,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: get_timestamp(),
        };

        let inserted = self
            .conn
            .call(move |conn: &mut rusqlite::Connection| {
                let result = conn.execute(
                    "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
                    params![user.username, user.password_hash, user.created_at],
                );

                match result {
                    Ok(_) => {}
                    Err(rusqlite::Error::SqliteFailure(err, _))
                        if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                    {
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                }

                Ok::<_, rusqlite::Error>(Some(User {
                    id: conn.last_insert_rowid(),
                    ..user
                }))
            })
            .await?;

        let user = inserted.ok_or(StoreError::DuplicateUsername)?;
        info!("New user made! {} (ID: {})", user.username, user.id);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_database;

    async fn store() -> SqliteCredentialStore {
        SqliteCredentialStore::new(open_database(":memory:").await.unwrap())
    }

    #[tokio::test]
    async fn missing_user_is_none() {
        let store = store().await;
        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn created_user_can_be_found() {
        let store = store().await;
        let created = store.create("alice", "$argon2id$fake").await.unwrap();
        let found = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found, created);
        assert_eq!(found.password_hash, "$argon2id$fake");
    }

    #[tokio::test]
    async fn ids_increase_monotonically() {
        let store = store().await;
        let a = store.create("a", "h").await.unwrap();
        let b = store.create("b", "h").await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected_by_constraint() {
        let store = store().await;
        store.create("alice", "h1").await.unwrap();
        let err = store.create("alice", "h2").await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername));

        // The original row is untouched.
        let found = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.password_hash, "h1");
    }

    #[tokio::test]
    async fn lookup_is_case_sensitive() {
        let store = store().await;
        store.create("Alice", "h").await.unwrap();
        assert!(store.find_by_username("alice").await.unwrap().is_none());
        // Different case is a different username.
        store.create("alice", "h").await.unwrap();
    }
}
