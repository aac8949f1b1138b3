use tokio_rusqlite::{Connection, rusqlite};
use tracing::{info, warn};

/// Current schema version.  Bump this whenever the schema changes and add a
/// corresponding migration arm in `check_schema_version`.
const SCHEMA_VERSION: u32 = 1;

/// Failures while opening the database.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("failed to open database: {0}")]
    Open(#[from] rusqlite::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),

    #[error("database schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Initialize the database schema.
pub async fn create_tables(conn: &Connection) -> Result<(), OpenError> {
    check_schema_version(conn).await?;
    create_schema(conn).await?;
    Ok(())
}

async fn create_schema(conn: &Connection) -> tokio_rusqlite::Result<()> {
    conn.call(|conn: &mut rusqlite::Connection| {
        // UNIQUE(username) is the real guard against duplicate registrations;
        // the service-level pre-check only produces a friendlier error.
        // TEXT uses BINARY collation, so lookups are case-sensitive.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                username      TEXT    NOT NULL UNIQUE,
                password_hash TEXT    NOT NULL,
                created_at    INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT    PRIMARY KEY,
                user_id    INTEGER NOT NULL,
                username   TEXT    NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
            [],
        )?;

        // --- Indexes --------------------------------------------------------
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at)",
            [],
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok::<_, rusqlite::Error>(())
    })
    .await
}

/// Refuse to touch a database written by a newer binary.
///
/// Uses `PRAGMA user_version` as the migration counter. Version 0 is a fresh
/// file; future migration arms go between the read and the final check.
async fn check_schema_version(conn: &Connection) -> Result<(), OpenError> {
    let current_version: u32 = conn
        .call(|conn| {
            let v: u32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
            Ok::<_, rusqlite::Error>(v)
        })
        .await?;

    if current_version > SCHEMA_VERSION {
        warn!(
            "Database schema at version {}; this build only knows version {}",
            current_version, SCHEMA_VERSION
        );
        return Err(OpenError::UnsupportedVersion {
            found: current_version,
            supported: SCHEMA_VERSION,
        });
    }

    if current_version < SCHEMA_VERSION {
        info!(
            "Database schema at version {}; target version {}",
            current_version, SCHEMA_VERSION
        );
    }

    Ok(())
}

/// Open or create the database and ensure the schema is up to date.
///
/// `path` may be `":memory:"` for a throwaway database.
pub async fn open_database(path: &str) -> Result<Connection, OpenError> {
    let conn = Connection::open(path).await?;

    // Every statement runs in autocommit mode, so a successful `execute` has
    // been committed (and, with synchronous=FULL, flushed) before it returns.
    conn.call(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok::<_, rusqlite::Error>(())
    })
    .await?;

    create_tables(&conn).await?;
    info!("Database ready at {}", path);
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_database_gets_current_version() {
        let conn = open_database(":memory:").await.unwrap();
        let v: u32 = conn
            .call(|c| c.query_row::<u32, _, _>("PRAGMA user_version", [], |r| r.get(0)))
            .await
            .unwrap();
        assert_eq!(v, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn create_tables_is_idempotent() {
        let conn = open_database(":memory:").await.unwrap();
        create_tables(&conn).await.unwrap();
        create_tables(&conn).await.unwrap();
    }

    #[tokio::test]
    async fn unopenable_path_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("gateway.db");
        let err = open_database(path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, OpenError::Open(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn newer_schema_is_refused() {
        let conn = Connection::open_in_memory().await.unwrap();
        conn.call(|c| {
            c.pragma_update(None, "user_version", SCHEMA_VERSION + 1)?;
            Ok::<_, rusqlite::Error>(())
        })
        .await
        .unwrap();

        let err = create_tables(&conn).await.unwrap_err();
        assert!(matches!(err, OpenError::UnsupportedVersion { .. }));
    }
}
