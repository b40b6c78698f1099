//! Email/password accounts.
//!
//! Registration and login go through the same [`Storage`] transactions as the
//! reception engine. bcrypt runs on the blocking pool so a slow hash never
//! stalls the async workers.

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use pvz_auth::{Email, PasswordError, PasswordHasher, Role, User, check_password_policy};
use pvz_core::DomainError;

use crate::store::{Storage, StorageTx, StoreError, UNIQUE_EMAIL_CONSTRAINT};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("email is already registered")]
    EmailTaken,

    /// Unknown email and wrong password look the same to the caller.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("storage conflict: {0}")]
    StorageConflict(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<DomainError> for AccountError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => AccountError::Validation(msg),
            other => AccountError::Validation(other.to_string()),
        }
    }
}

impl From<PasswordError> for AccountError {
    fn from(value: PasswordError) -> Self {
        AccountError::Hashing(value.to_string())
    }
}

impl From<StoreError> for AccountError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UniqueViolation(constraint) if constraint == UNIQUE_EMAIL_CONSTRAINT => {
                AccountError::EmailTaken
            }
            StoreError::UniqueViolation(constraint) => {
                AccountError::Storage(format!("unexpected unique violation: {constraint}"))
            }
            StoreError::Conflict(msg) => AccountError::StorageConflict(msg),
            StoreError::Unavailable(msg) => AccountError::StorageUnavailable(msg),
            StoreError::Backend(msg) => AccountError::Storage(msg),
        }
    }
}

/// Registers users and checks their credentials.
#[derive(Debug)]
pub struct AccountService<S> {
    store: S,
    hasher: PasswordHasher,
}

impl<S> AccountService<S> {
    pub fn new(store: S, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }
}

impl<S> AccountService<S>
where
    S: Storage,
{
    /// Create an account. The email must be unused; the password must pass
    /// [`check_password_policy`].
    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str, role: Role) -> Result<User, AccountError> {
        let email: Email = email.parse()?;
        check_password_policy(password)?;

        let password_hash = self.hash(password).await?;
        let user = User::register(email, password_hash, role, Utc::now());

        let mut tx = self.store.begin().await?;
        tx.insert_user(&user).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Resolve credentials to the stored user.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AccountError> {
        let Ok(email) = email.parse::<Email>() else {
            return Err(AccountError::InvalidCredentials);
        };

        let mut tx = self.store.begin().await?;
        let user = tx.user_by_email(&email).await?;
        tx.commit().await?;

        let Some(user) = user else {
            tracing::debug!("login for unknown email");
            return Err(AccountError::InvalidCredentials);
        };
        if !self.verify(password, &user.password_hash).await? {
            tracing::debug!(user_id = %user.id, "login with wrong password");
            return Err(AccountError::InvalidCredentials);
        }
        Ok(user)
    }

    async fn hash(&self, password: &str) -> Result<String, AccountError> {
        let hasher = self.hasher;
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AccountError::Hashing(e.to_string()))?
            .map_err(AccountError::from)
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AccountError> {
        let hasher = self.hasher;
        let (password, hash) = (password.to_owned(), hash.to_owned());
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AccountError::Hashing(e.to_string()))?
            .map_err(AccountError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStorage;

    fn service() -> AccountService<InMemoryStorage> {
        AccountService::new(InMemoryStorage::new(), PasswordHasher::new(4).unwrap())
    }

    #[tokio::test]
    async fn register_then_login() {
        let accounts = service();
        let user = accounts
            .register("Employee@Example.com", "password123", Role::Employee)
            .await
            .unwrap();
        assert_eq!(user.email.as_str(), "employee@example.com");
        assert_ne!(user.password_hash, "password123");

        let logged_in = accounts.login("employee@example.com", "password123").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(logged_in.role, Role::Employee);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let accounts = service();
        accounts
            .register("mod@example.com", "password123", Role::Moderator)
            .await
            .unwrap();

        let err = accounts
            .register("MOD@example.com", "another-pass", Role::Employee)
            .await
            .unwrap_err();
        assert_eq!(err, AccountError::EmailTaken);
    }

    #[tokio::test]
    async fn short_password_and_bad_email_are_validation_errors() {
        let accounts = service();
        assert!(matches!(
            accounts.register("a@example.com", "short", Role::Employee).await,
            Err(AccountError::Validation(_))
        ));
        assert!(matches!(
            accounts.register("not-an-email", "password123", Role::Employee).await,
            Err(AccountError::Validation(_))
        ));

        let mut tx = accounts.store.begin().await.unwrap();
        let stored = tx.user_by_email(&"a@example.com".parse().unwrap()).await.unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_indistinguishable() {
        let accounts = service();
        accounts
            .register("staff@example.com", "password123", Role::Employee)
            .await
            .unwrap();

        assert_eq!(
            accounts.login("staff@example.com", "password124").await.unwrap_err(),
            AccountError::InvalidCredentials
        );
        assert_eq!(
            accounts.login("ghost@example.com", "password123").await.unwrap_err(),
            AccountError::InvalidCredentials
        );
        assert_eq!(
            accounts.login("garbage", "password123").await.unwrap_err(),
            AccountError::InvalidCredentials
        );
    }
}
