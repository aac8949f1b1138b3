use std::sync::Arc;

use tracing::{info, warn};

use shared::types::User;

use super::{AuthError, PasswordKdf};
use crate::database::CredentialStore;

/// Registration and credential verification on top of a [`CredentialStore`].
///
/// Every call is an independent transaction against the store; the service
/// keeps no state of its own.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn CredentialStore>,
    kdf: PasswordKdf,
}

impl CredentialService {
    pub fn new(store: Arc<dyn CredentialStore>, kdf: PasswordKdf) -> Self {
        Self { store, kdf }
    }

    /// Register a new account. The returned record is for the caller's own
    /// bookkeeping; handlers must not echo it back.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput);
        }

        info!("Attempting registration for user: {}", username);

        // Fast path for the common conflict. The UNIQUE constraint below is
        // what actually guarantees a single winner.
        if self.store.find_by_username(username).await?.is_some() {
            warn!("Username already taken: {}", username);
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = self.kdf.hash(password).await?;

        match self.store.create(username, &password_hash).await {
            Ok(user) => {
                info!(
                    "User registered successfully: {} (ID: {})",
                    user.username, user.id
                );
                Ok(user)
            }
            Err(e) => {
                let err = AuthError::from(e);
                if matches!(err, AuthError::UsernameTaken) {
                    warn!("Lost registration race for username: {}", username);
                }
                Err(err)
            }
        }
    }

    /// Check a username/password pair.
    ///
    /// Unknown user, empty input and wrong password all fail with the same
    /// [`AuthError::InvalidCredentials`], after the same amount of KDF work.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = username.trim();

        let user = if username.is_empty() {
            None
        } else {
            self.store.find_by_username(username).await?
        };

        let Some(user) = user else {
            self.kdf.verify_dummy(password).await?;
            warn!("Login rejected: unknown user {:?}", username);
            return Err(AuthError::InvalidCredentials);
        };

        // No shortcut for an empty password: a known user must cost the same
        // single KDF run as an unknown one.
        if !self.kdf.verify(&user.password_hash, password).await? {
            warn!("Login rejected: bad password for {}", user.username);
            return Err(AuthError::InvalidCredentials);
        }

        info!(
            "Login successful for user: {} (ID: {})",
            user.username, user.id
        );
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::cheap_kdf;
    use crate::database::{MemoryCredentialStore, StoreError};
    use async_trait::async_trait;

    fn service() -> CredentialService {
        CredentialService::new(Arc::new(MemoryCredentialStore::new()), cheap_kdf())
    }

    #[tokio::test]
    async fn register_then_authenticate_returns_trimmed_username() {
        let svc = service();
        svc.register("  alice  ", "s3cret").await.unwrap();

        let user = svc.authenticate("alice", "s3cret").await.unwrap();
        assert_eq!(user.username, "alice");

        // Login input is trimmed the same way.
        let user = svc.authenticate(" alice\t", "s3cret").await.unwrap();
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn stored_hash_is_not_plaintext() {
        let svc = service();
        let user = svc.register("alice", "s3cret").await.unwrap();
        assert_ne!(user.password_hash, "s3cret");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn empty_fields_are_invalid_input() {
        let svc = service();
        assert!(matches!(
            svc.register("   ", "pw").await,
            Err(AuthError::InvalidInput)
        ));
        assert!(matches!(
            svc.register("alice", "").await,
            Err(AuthError::InvalidInput)
        ));
    }

    #[tokio::test]
    async fn whitespace_password_is_kept_verbatim() {
        let svc = service();
        svc.register("alice", "  ").await.unwrap();
        assert!(svc.authenticate("alice", "  ").await.is_ok());
        assert!(svc.authenticate("alice", " ").await.is_err());
    }

    #[tokio::test]
    async fn second_registration_is_username_taken() {
        let svc = service();
        svc.register("alice", "one").await.unwrap();
        assert!(matches!(
            svc.register("alice", "two").await,
            Err(AuthError::UsernameTaken)
        ));
        // The first password still works.
        assert!(svc.authenticate("alice", "one").await.is_ok());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_are_indistinguishable() {
        let svc = service();
        svc.register("alice", "s3cret").await.unwrap();

        let wrong = svc.authenticate("alice", "wrong").await.unwrap_err();
        let unknown = svc.authenticate("mallory", "s3cret").await.unwrap_err();
        let empty = svc.authenticate("", "").await.unwrap_err();

        for err in [&wrong, &unknown, &empty] {
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(wrong.to_message(), unknown.to_message());
        assert_eq!(wrong.status(), unknown.status());
    }

    #[tokio::test]
    async fn every_rejection_costs_one_verification() {
        let svc = service();
        svc.register("alice", "s3cret").await.unwrap();
        let kdf = &svc.kdf;

        for (username, password) in [
            ("alice", ""),
            ("mallory", ""),
            ("alice", "wrong"),
            ("mallory", "wrong"),
            ("", ""),
        ] {
            let before = kdf.verifications();
            let err = svc.authenticate(username, password).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
            assert_eq!(
                kdf.verifications() - before,
                1,
                "{:?}/{:?} should run the KDF exactly once",
                username,
                password
            );
        }
    }

    #[tokio::test]
    async fn usernames_are_case_sensitive() {
        let svc = service();
        svc.register("Alice", "pw").await.unwrap();
        assert!(svc.authenticate("alice", "pw").await.is_err());
        svc.register("alice", "pw2").await.unwrap();
    }

    /// Store whose pre-check always misses, to force the race path.
    struct RacingStore(MemoryCredentialStore);

    #[async_trait]
    impl CredentialStore for RacingStore {
        async fn find_by_username(&self, _username: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }

        async fn create(&self, username: &str, hash: &str) -> Result<User, StoreError> {
            self.0.create(username, hash).await
        }
    }

    #[tokio::test]
    async fn store_duplicate_after_precheck_is_username_taken() {
        let svc = CredentialService::new(
            Arc::new(RacingStore(MemoryCredentialStore::new())),
            cheap_kdf(),
        );
        svc.register("alice", "pw").await.unwrap();
        assert!(matches!(
            svc.register("alice", "pw").await,
            Err(AuthError::UsernameTaken)
        ));
    }

    #[tokio::test]
    async fn concurrent_registrations_have_one_winner() {
        let svc = service();
        let a = tokio::spawn({
            let svc = svc.clone();
            async move { svc.register("alice", "a").await }
        });
        let b = tokio::spawn({
            let svc = svc.clone();
            async move { svc.register("alice", "b").await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(AuthError::UsernameTaken)))
            .count();
        assert_eq!((wins, conflicts), (1, 1));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            #[test]
            fn register_then_authenticate_round_trips(
                username in "[ \t]{0,2}[a-zA-Z0-9_ñ]{1,16}[ \t]{0,2}",
                password in "\\PC{1,24}",
            ) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                rt.block_on(async {
                    let svc = service();
                    svc.register(&username, &password).await.unwrap();
                    let user = svc.authenticate(&username, &password).await.unwrap();
                    prop_assert_eq!(user.username, username.trim());
                    Ok(())
                })?;
            }
        }
    }
}
