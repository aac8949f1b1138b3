use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use shared::types::AppConfig;

pub mod auth;
pub mod database;
pub mod handlers;
pub mod session;

use auth::{AuthError, CredentialService, PasswordKdf};
use database::{
    CredentialStore, SessionStore, SqliteCredentialStore, SqliteSessionStore, open_database,
};
use session::SessionManager;

/// Everything a handler needs. Cheap to clone: one per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub credentials: CredentialService,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        credential_store: Arc<dyn CredentialStore>,
        session_store: Arc<dyn SessionStore>,
    ) -> Result<Self, AuthError> {
        let kdf = PasswordKdf::new(&config.auth.hashing)?;
        let sessions = SessionManager::new(session_store, &config.auth);

        Ok(Self {
            credentials: CredentialService::new(credential_store, kdf),
            sessions,
            config: Arc::new(config),
        })
    }

    /// Open (or create) the SQLite database named in the config and build
    /// the state on top of it.
    pub async fn open(config: AppConfig) -> Result<Self> {
        info!("Opening database at {}", config.database.path);

        let conn = open_database(&config.database.path)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.path))?;

        Self::new(
            config,
            Arc::new(SqliteCredentialStore::new(conn.clone())),
            Arc::new(SqliteSessionStore::new(conn)),
        )
        .context("Failed to initialise password hashing")
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::database::{MemoryCredentialStore, MemorySessionStore};
    use shared::types::server_config::HashingConfig;

    pub fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.hashing = HashingConfig {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        };
        config
    }

    pub fn test_state() -> AppState {
        AppState::new(
            test_config(),
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemorySessionStore::new()),
        )
        .unwrap()
    }
}
