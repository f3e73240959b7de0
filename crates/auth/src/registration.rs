use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::{info, warn};
use wellzo_database::{format_timestamp, WriteTransaction};

use crate::error::AuthError;
use crate::mailer::OtpPurpose;
use crate::models::{AuthOutcome, AuthProvider, DeviceInfo, Registration, User, UserRole};
use crate::otp::{generate_code, OtpState};
use crate::password::hash_password;
use crate::validation::{normalize_email, validate_email, validate_name, validate_password};
use crate::{new_public_id, Authenticator};

/// Optimistic write retries when two verifications race on one row.
const OTP_WRITE_ATTEMPTS: usize = 3;

impl Authenticator {
    /// Create an unverified account and mail it a verification code.
    pub async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        let email = normalize_email(&registration.email);
        validate_email(&email)?;
        validate_password(&registration.password)?;

        let name = match registration.name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            trimmed => trimmed.to_string(),
        };
        validate_name(&name)?;

        let role = registration.role.unwrap_or_default();
        if role == UserRole::Admin {
            return Err(AuthError::validation("Admin accounts cannot self-register"));
        }

        let password_hash = hash_password(&registration.password)?;
        let now = Utc::now();
        let mut otp = OtpState::default();
        otp.issue(generate_code(), now)?;

        let mut tx = WriteTransaction::begin(&self.pool).await?;

        let existing = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(AuthError::UserExists);
        }

        let timestamp = format_timestamp(now);
        let inserted = sqlx::query(
            "INSERT INTO users (public_id, email, name, password_hash, role, is_active, is_verified, \
             otp_code, otp_created_at, otp_attempts, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, 0, 0, ?, ?, 0, ?, ?)",
        )
        .bind(new_public_id())
        .bind(&email)
        .bind(&name)
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(otp.code.as_deref())
        .bind(&timestamp)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&mut *tx)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AuthError::UserExists,
            other => AuthError::Database(other),
        })?;
        let user_id = inserted.last_insert_rowid();

        sqlx::query(
            "INSERT INTO user_profiles (user_id, full_name, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&name)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(user_id, role = role.as_str(), "user registered, verification pending");

        if let Some(code) = otp.code.as_deref() {
            if let Err(error) = self
                .mailer
                .send_otp(&email, &name, code, OtpPurpose::Verification, self.otp_minutes())
                .await
            {
                warn!(user_id, %error, "failed to deliver verification code");
            }
        }

        self.user_by_id(user_id).await
    }

    pub async fn resend_otp(&self, email: &str) -> Result<(), AuthError> {
        let user = self.require_user_by_email(email).await?;
        if user.is_verified {
            return Err(AuthError::AlreadyVerified);
        }
        self.issue_otp(&user, OtpPurpose::Verification).await
    }

    /// Confirm the emailed code, activate the account and sign it in.
    pub async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        device: DeviceInfo,
    ) -> Result<AuthOutcome, AuthError> {
        let user = self.consume_otp(email, code).await?;
        info!(user_id = user.id, "email verified");
        self.open_session(&user, AuthProvider::Password, device).await
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let user = self.require_user_by_email(email).await?;
        if !user.is_active && user.is_verified {
            return Err(AuthError::AccountInactive);
        }
        self.issue_otp(&user, OtpPurpose::PasswordReset).await
    }

    /// Set a new password after the reset code checks out. Every open
    /// session is closed.
    pub async fn confirm_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;
        let user = self.consume_otp(email, code).await?;
        let password_hash = hash_password(new_password)?;
        let now = format_timestamp(Utc::now());

        let mut tx = WriteTransaction::begin(&self.pool).await?;
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(&now)
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        let closed = sqlx::query(
            "UPDATE user_sessions SET is_active = 0 WHERE user_id = ? AND is_active = 1",
        )
        .bind(user.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tx.commit().await?;

        info!(user_id = user.id, sessions_closed = closed, "password reset");
        Ok(())
    }

    async fn issue_otp(&self, user: &User, purpose: OtpPurpose) -> Result<(), AuthError> {
        let now = Utc::now();
        let mut state = self.load_otp_state(user.id).await?;
        let code = generate_code();
        state.issue(code.clone(), now)?;

        sqlx::query(
            "UPDATE users SET otp_code = ?, otp_created_at = ?, otp_attempts = 0, \
             otp_blocked_until = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(&code)
        .bind(format_timestamp(now))
        .bind(format_timestamp(now))
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        info!(user_id = user.id, ?purpose, "one-time code issued");
        self.mailer
            .send_otp(&user.email, &user.name, &code, purpose, self.otp_minutes())
            .await
    }

    /// Run one verification attempt against the stored code and persist the
    /// resulting state. Succeeds at most once per issued code.
    async fn consume_otp(&self, email: &str, code: &str) -> Result<User, AuthError> {
        let user = self.require_user_by_email(email).await?;

        for _ in 0..OTP_WRITE_ATTEMPTS {
            let original = self.load_otp_state(user.id).await?;
            let mut state = original.clone();
            let outcome = state.verify(code, Utc::now(), &self.otp_policy);

            // blocked attempts leave the row untouched
            if state == original {
                return match outcome {
                    Err(error) => Err(error.into()),
                    Ok(()) => self.user_by_id(user.id).await,
                };
            }

            let verified = outcome.is_ok();
            let updated = sqlx::query(
                "UPDATE users SET otp_code = ?, otp_created_at = ?, otp_attempts = ?, \
                 otp_blocked_until = ?, \
                 is_verified = CASE WHEN ? THEN 1 ELSE is_verified END, \
                 is_active = CASE WHEN ? THEN 1 ELSE is_active END, \
                 updated_at = ? \
                 WHERE id = ? AND otp_attempts = ? AND otp_created_at IS ?",
            )
            .bind(state.code.as_deref())
            .bind(state.issued_at.map(format_timestamp))
            .bind(i64::from(state.attempts))
            .bind(state.blocked_until.map(format_timestamp))
            .bind(verified)
            .bind(verified)
            .bind(format_timestamp(Utc::now()))
            .bind(user.id)
            .bind(i64::from(original.attempts))
            .bind(original.issued_at.map(format_timestamp))
            .execute(&self.pool)
            .await?;

            if updated.rows_affected() == 0 {
                continue;
            }

            if let Err(error) = outcome {
                warn!(user_id = user.id, attempts = state.attempts, %error, "one-time code rejected");
                return Err(error.into());
            }

            return self.user_by_id(user.id).await;
        }

        Err(AuthError::OtpContention)
    }

    async fn load_otp_state(&self, user_id: i64) -> Result<OtpState, AuthError> {
        let row = sqlx::query(
            "SELECT otp_code, otp_created_at, otp_attempts, otp_blocked_until FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AuthError::UserNotFound)?;

        let attempts: i64 = row.try_get("otp_attempts")?;
        Ok(OtpState {
            code: row.try_get("otp_code")?,
            issued_at: row.try_get::<Option<DateTime<Utc>>, _>("otp_created_at")?,
            attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
            blocked_until: row.try_get::<Option<DateTime<Utc>>, _>("otp_blocked_until")?,
        })
    }

    fn otp_minutes(&self) -> i64 {
        self.otp_policy.expiry.num_minutes().max(1)
    }
}
