use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use hyper::header::{HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

use shared::types::{NewSession, Session, User};
use shared::types::server_config::AuthConfig;

use crate::database::utils::{calculate_expiry, generate_session_token, get_timestamp};
use crate::database::{SessionStore, StoreError};
use crate::handlers::utils::headers;

/// Opaque session id as handed to the client. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Session state resolved for a single request.
#[derive(Debug, Default)]
pub struct RequestSession {
    token: Option<SessionToken>,
    session: Option<Session>,
}

impl RequestSession {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// True when the client presented a cookie, valid or not.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

/// Issues, resolves and clears server-side sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    cookie_name: String,
    ttl_secs: u64,
    cookie_secure: Option<bool>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            cookie_name: config.cookie_name.clone(),
            ttl_secs: config.session_ttl_secs(),
            cookie_secure: config.cookie_secure,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Create a session for `user` and return the token to put in the cookie.
    pub async fn establish(&self, user: &User) -> Result<SessionToken, StoreError> {
        let token = SessionToken(generate_session_token());
        let created_at = get_timestamp();
        let expires_at = calculate_expiry(i64::try_from(self.ttl_secs).unwrap_or(i64::MAX));

        self.store
            .insert(NewSession {
                session_id: token.0.clone(),
                user_id: user.id,
                username: user.username.clone(),
                created_at,
                expires_at,
            })
            .await?;

        info!(
            "Session established for user: {} (ID: {})",
            user.username, user.id
        );
        Ok(token)
    }

    /// Resolve the session cookie on an incoming request. Unknown and
    /// expired ids resolve to an unauthenticated context.
    pub async fn resume(&self, headers: &HeaderMap) -> Result<RequestSession, StoreError> {
        let Some(raw) = headers::get_cookie(headers, &self.cookie_name) else {
            return Ok(RequestSession::anonymous());
        };
        if raw.is_empty() {
            return Ok(RequestSession::anonymous());
        }

        let session = self.store.find(&raw, get_timestamp()).await?;
        if session.is_none() {
            debug!("Session cookie did not match a live session");
        }

        Ok(RequestSession {
            token: Some(SessionToken(raw)),
            session,
        })
    }

    /// Drop the session behind `request`. Safe to call when nothing is
    /// established, and safe to call twice.
    pub async fn clear(&self, request: &mut RequestSession) -> Result<(), StoreError> {
        if let Some(token) = request.token.take() {
            self.store.delete(token.as_str()).await?;
        }
        if let Some(session) = request.session.take() {
            info!("Session cleared for user: {}", session.username);
        }
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<usize, StoreError> {
        let removed = self.store.purge_expired(get_timestamp()).await?;
        if removed > 0 {
            info!("Purged {} expired session(s)", removed);
        }
        Ok(removed)
    }

    /// Whether cookies should carry `Secure`: forced by config, otherwise
    /// following how the request arrived.
    pub fn secure_for(&self, request_is_https: bool) -> bool {
        self.cookie_secure.unwrap_or(request_is_https)
    }

    pub fn cookie(&self, token: &SessionToken, secure: bool) -> Result<HeaderValue> {
        headers::set_cookie(
            &self.cookie_name,
            token.as_str(),
            Some(Duration::from_secs(self.ttl_secs)),
            Some("/"),
            true,
            secure,
        )
    }

    pub fn expired_cookie(&self, secure: bool) -> Result<HeaderValue> {
        headers::set_cookie(
            &self.cookie_name,
            "",
            Some(Duration::from_secs(0)),
            Some("/"),
            true,
            secure,
        )
        .inspect_err(|e| warn!("Failed to build logout cookie: {}", e))
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("cookie_name", &self.cookie_name)
            .field("ttl_secs", &self.ttl_secs)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}
