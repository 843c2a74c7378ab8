//! Store-backed implementation of the `AuthService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::domain::{AccountError, OperatorAccount, OperatorId, OperatorStore, PasswordHasher};
use crate::services::auth_service::{AuthError, AuthService, OperatorProfile};
use crate::services::token::TokenIssuer;

pub struct OperatorAuthService {
    store: Arc<dyn OperatorStore>,
    hasher: PasswordHasher,
    tokens: Arc<TokenIssuer>,
}

impl OperatorAuthService {
    #[must_use]
    pub fn new(
        store: Arc<dyn OperatorStore>,
        hasher: PasswordHasher,
        tokens: Arc<TokenIssuer>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    async fn build_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<OperatorAccount, AuthError> {
        let hasher = self.hasher.clone();
        let (username, email, password) =
            (username.to_string(), email.to_string(), password.to_string());

        let created = tokio::task::spawn_blocking(move || {
            OperatorAccount::create(&username, &email, &password, &hasher)
        })
        .await
        .map_err(|e| {
            error!("Password hashing task failed: {}", e);
            AuthError::Infrastructure("failed to create operator")
        })?;

        match created {
            Ok(account) => Ok(account),
            Err(AccountError::Validation(e)) => Err(AuthError::Validation(e)),
            Err(AccountError::Hash(e)) => {
                error!("Failed to hash operator password: {}", e);
                Err(AuthError::Infrastructure("failed to create operator"))
            }
        }
    }
}

#[async_trait]
impl AuthService for OperatorAuthService {
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<OperatorId, AuthError> {
        match self.store.find_by_username(username).await {
            Ok(Some(_)) => return Err(AuthError::UsernameTaken),
            Ok(None) => {}
            Err(e) => {
                error!("Username lookup failed during registration: {:#}", e);
                return Err(AuthError::Infrastructure("failed to validate username"));
            }
        }

        match self.store.find_by_email(email).await {
            Ok(Some(_)) => return Err(AuthError::EmailTaken),
            Ok(None) => {}
            Err(e) => {
                error!("Email lookup failed during registration: {:#}", e);
                return Err(AuthError::Infrastructure("failed to validate email"));
            }
        }

        let account = self.build_account(username, email, password).await?;

        let id = self.store.save(&account).await.map_err(|e| {
            error!("Failed to persist operator {}: {:#}", username, e);
            AuthError::Infrastructure("failed to create operator")
        })?;

        info!(operator_id = %id, username = %username, "Operator registered");
        Ok(id)
    }

    async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let account = match self.store.find_by_username(username).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                warn!(username = %username, "Login rejected: unknown operator");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                error!("Operator lookup failed during login: {:#}", e);
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !account.is_active() {
            warn!(username = %username, "Login rejected: account inactive");
            return Err(AuthError::InactiveAccount);
        }

        let hash = account.password_hash().to_string();
        let candidate = password.to_string();
        let matches = tokio::task::spawn_blocking(move || PasswordHasher::verify(&hash, &candidate))
            .await
            .unwrap_or_else(|e| {
                error!("Password verification task failed: {}", e);
                false
            });

        if !matches {
            warn!(username = %username, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self
            .tokens
            .issue(account.id(), account.username())
            .map_err(|e| {
                error!("Failed to issue token for {}: {}", username, e);
                AuthError::Infrastructure("failed to generate authentication token")
            })?;

        info!(operator_id = %account.id(), username = %username, "Operator logged in");
        Ok(token)
    }

    async fn get_operator(&self, id: OperatorId) -> Result<OperatorProfile, AuthError> {
        let account = self
            .store
            .find_by_id(id)
            .await
            .map_err(|e| {
                error!("Failed to load operator {}: {:#}", id, e);
                AuthError::Infrastructure("failed to load operator")
            })?
            .ok_or(AuthError::OperatorNotFound)?;

        Ok(OperatorProfile::from(&account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryOperatorStore;
    use crate::domain::ValidationError;

    const SECRET: &str = "test-secret-key-minimum-32-characters-long";

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1024, 1, 1).unwrap()
    }

    fn tokens() -> Arc<TokenIssuer> {
        Arc::new(TokenIssuer::new(SECRET).unwrap())
    }

    fn service_with(store: Arc<dyn OperatorStore>) -> OperatorAuthService {
        OperatorAuthService::new(store, hasher(), tokens())
    }

    fn service() -> (OperatorAuthService, Arc<InMemoryOperatorStore>) {
        let store = Arc::new(InMemoryOperatorStore::new());
        (service_with(store.clone()), store)
    }

    /// Store whose every call fails, standing in for a dead database.
    struct FailingStore;

    #[async_trait]
    impl OperatorStore for FailingStore {
        async fn save(&self, _: &OperatorAccount) -> anyhow::Result<OperatorId> {
            anyhow::bail!("database is locked")
        }
        async fn find_by_username(&self, _: &str) -> anyhow::Result<Option<OperatorAccount>> {
            anyhow::bail!("database is locked")
        }
        async fn find_by_email(&self, _: &str) -> anyhow::Result<Option<OperatorAccount>> {
            anyhow::bail!("database is locked")
        }
        async fn find_by_id(&self, _: OperatorId) -> anyhow::Result<Option<OperatorAccount>> {
            anyhow::bail!("database is locked")
        }
    }

    /// Lookups succeed with a miss but writes fail.
    struct ReadOnlyStore;

    #[async_trait]
    impl OperatorStore for ReadOnlyStore {
        async fn save(&self, _: &OperatorAccount) -> anyhow::Result<OperatorId> {
            anyhow::bail!("attempt to write a readonly database")
        }
        async fn find_by_username(&self, _: &str) -> anyhow::Result<Option<OperatorAccount>> {
            Ok(None)
        }
        async fn find_by_email(&self, _: &str) -> anyhow::Result<Option<OperatorAccount>> {
            Ok(None)
        }
        async fn find_by_id(&self, _: OperatorId) -> anyhow::Result<Option<OperatorAccount>> {
            Ok(None)
        }
    }

    /// Username lookups miss, email lookups fail, and saves are counted.
    #[derive(Default)]
    struct EmailLookupFailsStore {
        saves: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl OperatorStore for EmailLookupFailsStore {
        async fn save(&self, _: &OperatorAccount) -> anyhow::Result<OperatorId> {
            self.saves.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(OperatorId::new(1))
        }
        async fn find_by_username(&self, _: &str) -> anyhow::Result<Option<OperatorAccount>> {
            Ok(None)
        }
        async fn find_by_email(&self, _: &str) -> anyhow::Result<Option<OperatorAccount>> {
            anyhow::bail!("disk I/O error")
        }
        async fn find_by_id(&self, _: OperatorId) -> anyhow::Result<Option<OperatorAccount>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (service, _) = service();

        let id = service.register("abc", "a@exa.com", "12345678").await.unwrap();
        assert_eq!(id, OperatorId::new(1));

        let token = service.login("abc", "12345678").await.unwrap();
        let claims = tokens().verify(&token).unwrap();
        assert_eq!(claims.subject_id, OperatorId::new(1));
        assert_eq!(claims.username, "abc");

        assert!(matches!(
            service.login("abc", "wrongpass").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let (service, store) = service();
        service
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap();

        assert!(matches!(
            service
                .register("alice", "other@example.com", "password123")
                .await,
            Err(AuthError::UsernameTaken)
        ));
        assert!(matches!(
            service
                .register("other", "alice@example.com", "password123")
                .await,
            Err(AuthError::EmailTaken)
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_username_conflict_reported_before_email_conflict() {
        let (service, _) = service();
        service
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap();

        assert!(matches!(
            service
                .register("alice", "alice@example.com", "password123")
                .await,
            Err(AuthError::UsernameTaken)
        ));
    }

    #[tokio::test]
    async fn test_register_propagates_first_validation_error() {
        let (service, store) = service();

        let err = service.register("ab", "", "short").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Validation(ValidationError::UsernameTooShort)
        ));
        assert_eq!(err.to_string(), "username must be at least 3 characters long");

        assert!(matches!(
            service.register("alice", "alice@example.com", "").await,
            Err(AuthError::Validation(ValidationError::PasswordRequired))
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_login_unknown_user_is_invalid_credentials() {
        let (service, _) = service();

        assert!(matches!(
            service.login("nobody", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_inactive_account() {
        let store = Arc::new(InMemoryOperatorStore::new());
        let mut account =
            OperatorAccount::create("dormant", "dormant@example.com", "password123", &hasher())
                .unwrap();
        account.deactivate();
        store.save(&account).await.unwrap();

        let service = service_with(store);
        assert!(matches!(
            service.login("dormant", "password123").await,
            Err(AuthError::InactiveAccount)
        ));
    }

    #[tokio::test]
    async fn test_store_failures() {
        let service = service_with(Arc::new(FailingStore));

        let err = service
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Infrastructure(_)));
        assert_eq!(err.to_string(), "failed to validate username");

        // Login never leaks that the store is down.
        assert!(matches!(
            service.login("alice", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));

        let err = service.get_operator(OperatorId::new(1)).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to load operator");
    }

    #[tokio::test]
    async fn test_email_lookup_failure() {
        let store = Arc::new(EmailLookupFailsStore::default());
        let service = service_with(store.clone());

        let err = service
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Infrastructure("failed to validate email")
        ));
        assert_eq!(store.saves.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_save_failure() {
        let service = service_with(Arc::new(ReadOnlyStore));

        let err = service
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to create operator");
    }

    #[tokio::test]
    async fn test_get_operator() {
        let (service, _) = service();
        let id = service
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap();

        let profile = service.get_operator(id).await.unwrap();
        assert_eq!(profile.id, id);
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.email, "alice@example.com");
        assert!(profile.active);

        assert!(matches!(
            service.get_operator(OperatorId::new(99)).await,
            Err(AuthError::OperatorNotFound)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_logins() {
        let (service, _) = service();
        service
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap();
        let service = Arc::new(service);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let password = if i % 2 == 0 { "password123" } else { "wrongpass1" };
                    service.login("alice", password).await
                })
            })
            .collect();

        let mut succeeded = 0;
        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.unwrap();
            if i % 2 == 0 {
                assert!(result.is_ok());
                succeeded += 1;
            } else {
                assert!(matches!(result, Err(AuthError::InvalidCredentials)));
            }
        }
        assert_eq!(succeeded, 4);
    }
}
