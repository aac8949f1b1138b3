use std::fmt;

// ---------------------------------------------------------------------------
// Rows returned from the credential store
// ---------------------------------------------------------------------------

/// A registered account. Created once at registration, never updated.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2id PHC string. Never the plaintext password.
    pub password_hash: String,
    pub created_at: i64,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Session types
//
//   The session id itself never appears in these structs once stored: it is
//   the lookup key, held by the client cookie and by the store only.
// ---------------------------------------------------------------------------

/// Data required to INSERT a new session row.
#[derive(Clone)]
pub struct NewSession {
    pub session_id: String,
    pub user_id: i64,
    /// Denormalised copy of the username for display.
    pub username: String,
    pub created_at: i64,
    pub expires_at: i64,
}

/// A live session read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub created_at: i64,
    pub expires_at: i64,
}

impl Session {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

impl From<&NewSession> for Session {
    fn from(new: &NewSession) -> Self {
        Self {
            user_id: new.user_id,
            username: new.username.clone(),
            created_at: new.created_at,
            expires_at: new.expires_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Debug for NewSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewSession")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user_id={}, username={}, expires_at={}",
            self.user_id, self.username, self.expires_at
        )
    }
}
