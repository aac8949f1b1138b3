use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use rand::rngs::OsRng;

/// Number of random bytes behind a session id.
const SESSION_TOKEN_BYTES: usize = 32;

/// Get current Unix timestamp in seconds
pub fn get_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Generate an unpredictable session id: 32 bytes from the OS CSPRNG, hex
/// encoded.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Calculate session expiry (current time + duration in seconds)
pub fn calculate_expiry(duration_secs: i64) -> i64 {
    get_timestamp().saturating_add(duration_secs)
}
