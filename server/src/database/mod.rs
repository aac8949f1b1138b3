pub mod create;
pub mod credentials;
pub mod memory;
pub mod sessions;
pub mod utils;

pub use create::{OpenError, open_database};
pub use credentials::{CredentialStore, SqliteCredentialStore};
pub use memory::{MemoryCredentialStore, MemorySessionStore};
pub use sessions::{SessionStore, SqliteSessionStore};

/// Errors surfaced by the credential and session stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The UNIQUE constraint on `users.username` rejected an insert.
    #[error("username already registered")]
    DuplicateUsername,

    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
}
