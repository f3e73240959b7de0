use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::otp::OtpError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("a user with this email already exists")]
    UserExists,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is not verified, check your email for the verification code")]
    AccountNotVerified,
    #[error("account is already verified")]
    AlreadyVerified,
    #[error("account is disabled")]
    AccountInactive,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Otp(#[from] OtpError),
    #[error("verification is busy, please retry")]
    OtpContention,
    #[error("google sign-in is not configured")]
    GoogleOauthDisabled,
    #[error("invalid google token: {0}")]
    GoogleToken(String),
    #[error("google oauth error: {0}")]
    GoogleOauth(#[from] anyhow::Error),
    #[error("invalid token: {0}")]
    Token(String),
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("invalid session")]
    InvalidSession,
    #[error("profile not found")]
    ProfileNotFound,
    #[error("failed to send email: {0}")]
    Mail(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
}

impl AuthError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// When the caller should come back, for lockout errors.
    pub fn retry_after(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Otp(OtpError::Blocked { until }) => Some(*until),
            _ => None,
        }
    }
}
