//! Signed access tokens.
//!
//! Tokens are HS256 JWTs carrying the operator id and username. They are
//! self-contained: verifying one needs only the signing secret, never a store
//! lookup. Every verification failure (malformed, bad signature, expired, not
//! yet valid) collapses into [`TokenError::InvalidToken`].

use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::{ConfigError, validate_secret};
use crate::constants::token::LIFETIME_HOURS;
use crate::domain::OperatorId;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "user_id")]
    pub subject_id: OperatorId,

    pub username: String,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "nbf", with = "chrono::serde::ts_seconds")]
    pub not_before: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Build an issuer from the process-wide secret.
    ///
    /// Fails when the secret is missing or shorter than 32 bytes, so a weak
    /// key can never sign or accept tokens.
    pub fn new(secret: &str) -> Result<Self, ConfigError> {
        validate_secret(secret)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iat"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime: Duration::hours(LIFETIME_HOURS),
        })
    }

    /// Sign a token for `subject`, valid from now for the fixed lifetime.
    pub fn issue(&self, subject: OperatorId, username: &str) -> Result<String, TokenError> {
        self.issue_at(subject, username, Utc::now())
    }

    fn issue_at(
        &self,
        subject: OperatorId,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        // Claims travel as whole seconds; truncate so expiry - issue is exact.
        let now = now.trunc_subsecs(0);

        let claims = TokenClaims {
            subject_id: subject,
            username: username.to_string(),
            issued_at: now,
            not_before: now,
            expires_at: now + self.lifetime,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check structure, signature and validity window, returning the claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token verification failed");
                TokenError::InvalidToken
            })
    }
}
