//! The operator account: the authenticated principal of the service.
//!
//! Accounts are only built through [`OperatorAccount::create`], which validates
//! every field before hashing the password, or rehydrated by a store adapter via
//! [`OperatorAccount::restore`]. The plaintext password never outlives the call
//! that hashes it.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::OperatorId;
use super::password::{HashError, PasswordHasher};
use crate::constants::operator::{
    EMAIL_MAX_LEN, PASSWORD_MAX_LEN, PASSWORD_MIN_LEN, USERNAME_MAX_LEN, USERNAME_MIN_LEN,
};

/// A single violated field rule. Validation stops at the first violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("username is required")]
    UsernameRequired,

    #[error("username must be at least 3 characters long")]
    UsernameTooShort,

    #[error("username must not exceed 50 characters")]
    UsernameTooLong,

    #[error("email is required")]
    EmailRequired,

    #[error("email must not exceed 100 characters")]
    EmailTooLong,

    #[error("password is required")]
    PasswordRequired,

    #[error("password must be at least 8 characters long")]
    PasswordTooShort,

    #[error("password must not exceed 72 characters")]
    PasswordTooLong,
}

impl ValidationError {
    /// Name of the offending field, as exposed in request bodies.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::UsernameRequired | Self::UsernameTooShort | Self::UsernameTooLong => "username",
            Self::EmailRequired | Self::EmailTooLong => "email",
            Self::PasswordRequired | Self::PasswordTooShort | Self::PasswordTooLong => "password",
        }
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Persisted shape of an account, used by store adapters to rehydrate.
#[derive(Debug, Clone)]
pub struct StoredOperator {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorAccount {
    id: OperatorId,
    username: String,
    email: String,
    password_hash: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OperatorAccount {
    /// Validate the fields, hash the password and build an active, unsaved account.
    ///
    /// Rules are checked in a fixed order and the first failure is returned.
    pub fn create(
        username: &str,
        email: &str,
        password: &str,
        hasher: &PasswordHasher,
    ) -> Result<Self, AccountError> {
        validate_username(username)?;
        validate_email(email)?;
        validate_password(password)?;

        let password_hash = hasher.hash(password)?;
        let now = Utc::now();

        Ok(Self {
            id: OperatorId::UNSAVED,
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild an account from its stored form.
    ///
    /// A stored `updated_at` earlier than `created_at` is clamped up to it.
    #[must_use]
    pub fn restore(stored: StoredOperator) -> Self {
        let updated_at = stored.updated_at.max(stored.created_at);

        Self {
            id: OperatorId::new(stored.id),
            username: stored.username,
            email: stored.email,
            password_hash: stored.password_hash,
            active: stored.active,
            created_at: stored.created_at,
            updated_at,
        }
    }

    /// Constant-time check of `candidate` against the stored hash.
    #[must_use]
    pub fn verify_password(&self, candidate: &str) -> bool {
        PasswordHasher::verify(&self.password_hash, candidate)
    }

    /// Replace the password. Only the length rules are re-checked.
    pub fn update_password(
        &mut self,
        new_password: &str,
        hasher: &PasswordHasher,
    ) -> Result<(), AccountError> {
        validate_password(new_password)?;

        self.password_hash = hasher.hash(new_password)?;
        self.touch();
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.touch();
    }

    pub fn activate(&mut self) {
        self.active = true;
        self.touch();
    }

    #[must_use]
    pub fn with_id(mut self, id: OperatorId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub const fn id(&self) -> OperatorId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.created_at);
    }
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::UsernameRequired);
    }
    if username.len() < USERNAME_MIN_LEN {
        return Err(ValidationError::UsernameTooShort);
    }
    if username.len() > USERNAME_MAX_LEN {
        return Err(ValidationError::UsernameTooLong);
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::EmailRequired);
    }
    if email.len() > EMAIL_MAX_LEN {
        return Err(ValidationError::EmailTooLong);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::PasswordRequired);
    }
    if password.len() < PASSWORD_MIN_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    if password.len() > PASSWORD_MAX_LEN {
        return Err(ValidationError::PasswordTooLong);
    }
    Ok(())
}
