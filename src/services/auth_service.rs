//! Domain service for operator registration and login.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::{OperatorAccount, OperatorId, ValidationError};

/// Errors specific to authentication operations.
///
/// `Infrastructure` carries only a caller-safe summary; the underlying cause is
/// logged where it happens and never crosses the service boundary.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("username already exists")]
    UsernameTaken,

    #[error("email already exists")]
    EmailTaken,

    #[error("invalid credentials")]
    InvalidCredentials,

    /// Distinct from `InvalidCredentials`, which tells an unauthenticated
    /// caller that the username exists. Pending product review.
    #[error("operator account is inactive")]
    InactiveAccount,

    #[error("operator not found")]
    OperatorNotFound,

    #[error("{0}")]
    Infrastructure(&'static str),
}

/// Operator info DTO for responses. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct OperatorProfile {
    pub id: OperatorId,
    pub username: String,
    pub email: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&OperatorAccount> for OperatorProfile {
    fn from(account: &OperatorAccount) -> Self {
        Self {
            id: account.id(),
            username: account.username().to_string(),
            email: account.email().to_string(),
            active: account.is_active(),
            created_at: account.created_at(),
            updated_at: account.updated_at(),
        }
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an operator account and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UsernameTaken`] / [`AuthError::EmailTaken`] on
    /// duplicates and [`AuthError::Validation`] for the first invalid field.
    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<OperatorId, AuthError>;

    /// Verifies credentials and returns a signed access token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for unknown users, wrong
    /// passwords and store failures alike.
    async fn login(&self, username: &str, password: &str) -> Result<String, AuthError>;

    /// Gets the profile of an operator by id.
    async fn get_operator(&self, id: OperatorId) -> Result<OperatorProfile, AuthError>;
}
