use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::types::server_config::{AppConfig, ConfigError, MAX_PARALLELISM};

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Loading configuration from: {}", path);

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path);

    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config: AppConfig = toml::from_str(&contents)?;

    info!("Configuration loaded successfully");
    debug!("Config: {:?}", config);

    validate_config(&config)?;

    info!("Config validated");

    Ok(config)
}

/// Like [`load_config`], but a missing file falls back to the built-in
/// defaults instead of failing. Any other error is still reported.
pub fn load_config_or_default(path: &str) -> Result<AppConfig, ConfigError> {
    if !Path::new(path).exists() {
        warn!("Config file {} not found, using built-in defaults", path);
        let config = AppConfig::default();
        validate_config(&config)?;
        return Ok(config);
    }

    match load_config(path) {
        Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            warn!("Config file {} disappeared, using built-in defaults", path);
            Ok(AppConfig::default())
        }
        other => other,
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.bind.trim().is_empty() {
        return Err(ConfigError::InvalidConfig("bind cannot be empty".into()));
    }

    if config.server.max_body_bytes == 0 {
        return Err(ConfigError::InvalidConfig(
            "max_body_bytes must be greater than 0".into(),
        ));
    }

    if config.database.path.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "database path cannot be empty".into(),
        ));
    }

    if config.auth.session_ttl_minutes == 0 {
        return Err(ConfigError::InvalidConfig(
            "session_ttl_minutes must be greater than 0".into(),
        ));
    }

    // Expiry timestamps are i64 seconds.
    let ttl_fits = config
        .auth
        .session_ttl_minutes
        .checked_mul(60)
        .is_some_and(|secs| i64::try_from(secs).is_ok());
    if !ttl_fits {
        return Err(ConfigError::InvalidConfig(
            "session_ttl_minutes is too large".into(),
        ));
    }

    if config.auth.session_sweep_seconds == 0 {
        return Err(ConfigError::InvalidConfig(
            "session_sweep_seconds must be greater than 0".into(),
        ));
    }

    // The cookie name ends up verbatim in a `Set-Cookie` header.
    let name = &config.auth.cookie_name;
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::InvalidConfig(
            "cookie_name must be non-empty and contain only [A-Za-z0-9_-]".into(),
        ));
    }

    let hashing = &config.auth.hashing;
    if hashing.iterations == 0 || hashing.parallelism == 0 {
        return Err(ConfigError::InvalidConfig(
            "hashing iterations and parallelism must be greater than 0".into(),
        ));
    }

    if hashing.parallelism > MAX_PARALLELISM {
        return Err(ConfigError::InvalidConfig(format!(
            "hashing parallelism must be at most {}",
            MAX_PARALLELISM
        )));
    }

    // Argon2 needs at least 8 KiB of memory per lane.
    if hashing
        .parallelism
        .checked_mul(8)
        .is_none_or(|min| hashing.memory_kib < min)
    {
        return Err(ConfigError::InvalidConfig(
            "hashing memory_kib must be at least 8 * parallelism".into(),
        ));
    }

    Ok(())
}
