use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on a request body; larger bodies are answered with 413.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite file path. `":memory:"` keeps everything in RAM (tests only).
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Argon2id cost parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct HashingConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_session_ttl")]
    pub session_ttl_minutes: u64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Force the `Secure` cookie attribute on or off.
    ///
    /// When unset the attribute follows the request: it is added whenever the
    /// request arrived over HTTPS (directly or via `X-Forwarded-Proto`).
    #[serde(default)]
    pub cookie_secure: Option<bool>,
    /// How often the server deletes expired sessions.
    #[serde(default = "default_sweep_seconds")]
    pub session_sweep_seconds: u64,
    #[serde(default)]
    pub hashing: HashingConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// Full bind address, e.g. `"127.0.0.1:5000"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl AuthConfig {
    /// Session lifetime in seconds, used for both the stored expiry and the
    /// cookie `Max-Age`.
    pub fn session_ttl_secs(&self) -> u64 {
        self.session_ttl_minutes.saturating_mul(60)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: default_session_ttl(),
            cookie_name: default_cookie_name(),
            cookie_secure: None,
            session_sweep_seconds: default_sweep_seconds(),
            hashing: HashingConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

pub fn default_bind() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    5000
}

pub fn default_max_body_bytes() -> usize {
    16 * 1024
}

pub fn default_database_path() -> String {
    "data.db".to_string()
}

pub fn default_session_ttl() -> u64 {
    24 * 60
}

pub fn default_cookie_name() -> String {
    "session_id".to_string()
}

pub fn default_sweep_seconds() -> u64 {
    300
}

/// Largest lane count Argon2 accepts (`argon2::Params::MAX_P_COST`).
pub const MAX_PARALLELISM: u32 = 0x00FF_FFFF;

// Same values as `argon2::Params::DEFAULT`.
pub fn default_memory_kib() -> u32 {
    19 * 1024
}

pub fn default_iterations() -> u32 {
    2
}

pub fn default_parallelism() -> u32 {
    1
}
