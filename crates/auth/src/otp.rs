//! One-time password lifecycle.
//!
//! The state lives on the user row; this module only decides transitions so
//! that the rules can be exercised with a fixed clock.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;
use wellzo_config::OtpConfig;

pub const OTP_LENGTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("too many attempts, try again after {until}")]
    Blocked { until: DateTime<Utc> },
    #[error("verification code has expired")]
    Expired,
    #[error("invalid verification code")]
    Mismatch,
}

#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub expiry: Duration,
    pub max_attempts: u32,
    pub block: Duration,
}

impl OtpPolicy {
    pub fn from_config(config: &OtpConfig) -> Self {
        Self {
            expiry: crate::seconds(config.expiry_seconds),
            max_attempts: config.max_attempts.max(1),
            block: crate::seconds(config.block_seconds),
        }
    }
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self::from_config(&OtpConfig::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OtpState {
    pub code: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl OtpState {
    pub fn active_block(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.blocked_until.filter(|until| *until > now)
    }

    /// Store a fresh code. Refused while a block is in force.
    pub fn issue(&mut self, code: String, now: DateTime<Utc>) -> Result<(), OtpError> {
        if let Some(until) = self.active_block(now) {
            return Err(OtpError::Blocked { until });
        }

        self.code = Some(code);
        self.issued_at = Some(now);
        self.attempts = 0;
        self.blocked_until = None;
        Ok(())
    }

    /// Check a submitted code. A success clears every field.
    pub fn verify(
        &mut self,
        candidate: &str,
        now: DateTime<Utc>,
        policy: &OtpPolicy,
    ) -> Result<(), OtpError> {
        if let Some(until) = self.active_block(now) {
            return Err(OtpError::Blocked { until });
        }

        if self.blocked_until.take().is_some() {
            self.attempts = 0;
        }

        self.attempts = self.attempts.saturating_add(1);

        let outcome = match (&self.code, self.issued_at) {
            (Some(_), Some(issued_at)) if now - issued_at > policy.expiry => Err(OtpError::Expired),
            (Some(code), Some(_)) if code == candidate.trim() => Ok(()),
            (Some(_), Some(_)) => Err(OtpError::Mismatch),
            _ => Err(OtpError::Expired),
        };

        match outcome {
            Ok(()) => {
                *self = Self::default();
                Ok(())
            }
            Err(_) if self.attempts >= policy.max_attempts => {
                let until = now + policy.block;
                self.blocked_until = Some(until);
                Err(OtpError::Blocked { until })
            }
            Err(error) => Err(error),
        }
    }
}

pub fn generate_code() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{value:0width$}", width = OTP_LENGTH)
}
