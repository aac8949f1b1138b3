use std::sync::Arc;

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

use shared::types::server_config::HashingConfig;

use super::AuthError;
use crate::database::utils::generate_session_token;

/// Argon2id password hashing with a fresh random salt per hash.
///
/// Hashes are PHC strings (`$argon2id$v=19$m=...`) that embed their own
/// parameters, so raising the cost later does not break existing accounts.
/// The async methods run the KDF on tokio's blocking pool.
#[derive(Clone)]
pub struct PasswordKdf {
    params: Params,
    /// Hash of a random throwaway password, verified against when a login
    /// names an unknown user so both paths cost one KDF run.
    dummy_hash: Arc<str>,
    #[cfg(test)]
    verifications: Arc<std::sync::atomic::AtomicUsize>,
}

impl PasswordKdf {
    pub fn new(config: &HashingConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| AuthError::Hashing(format!("invalid argon2 parameters: {}", e)))?;

        let mut kdf = Self {
            params,
            dummy_hash: Arc::from(""),
            #[cfg(test)]
            verifications: Arc::default(),
        };
        kdf.dummy_hash = Arc::from(kdf.hash_blocking(&generate_session_token())?);
        Ok(kdf)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password using Argon2id.
    pub fn hash_blocking(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    /// Verify a password against its hash.
    ///
    /// The digest comparison inside `password-hash` is constant time. A
    /// mismatch is `Ok(false)`; only an unparseable hash is an error.
    pub fn verify_blocking(&self, hash: &str, password: &str) -> Result<bool, AuthError> {
        #[cfg(test)]
        self.verifications
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Hashing(format!("stored hash is malformed: {}", e)))?;

        match self.argon2().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Hashing(e.to_string())),
        }
    }

    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let kdf = self.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || kdf.hash_blocking(&password))
            .await
            .map_err(|e| AuthError::Hashing(format!("hashing task failed: {}", e)))?
    }

    pub async fn verify(&self, hash: &str, password: &str) -> Result<bool, AuthError> {
        let kdf = self.clone();
        let hash = hash.to_string();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || kdf.verify_blocking(&hash, &password))
            .await
            .map_err(|e| AuthError::Hashing(format!("verification task failed: {}", e)))?
    }

    /// Spend one verification on the throwaway hash. The result is
    /// meaningless and discarded.
    pub async fn verify_dummy(&self, password: &str) -> Result<(), AuthError> {
        let hash = self.dummy_hash.clone();
        self.verify(&hash, password).await.map(|_| ())
    }
}

#[cfg(test)]
impl PasswordKdf {
    /// Number of verifications run so far, shared by all clones.
    pub(crate) fn verifications(&self) -> usize {
        self.verifications.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl std::fmt::Debug for PasswordKdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordKdf")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn cheap_kdf() -> PasswordKdf {
    PasswordKdf::new(&HashingConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}
