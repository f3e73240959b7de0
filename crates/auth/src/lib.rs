//! Accounts for the Wellzo backend: registration with emailed one-time
//! codes, password and Google sign-in, JWT-backed sessions, password reset,
//! account deletion and the demographic profile.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Duration;
use cuid2::CuidConstructor;
use once_cell::sync::Lazy;
use rand::RngCore;
use sqlx::SqlitePool;
use wellzo_config::{AuthConfig, OtpConfig};

mod account;
mod registration;
mod sessions;

pub mod error;
pub mod google;
pub mod jwt;
pub mod mailer;
pub mod models;
pub mod otp;
pub mod password;
pub mod validation;

pub use account::AccountRemoval;
pub use error::AuthError;
pub use google::{GoogleProfile, GoogleVerifier};
pub use jwt::{Claims, JwtManager, TokenType};
pub use mailer::{Mailer, OtpPurpose};
pub use models::{
    AuthOutcome, AuthProvider, DeviceInfo, ProfileUpdate, Registration, TokenPair, User,
    UserProfile, UserRole, UserSession,
};
pub use otp::{OtpError, OtpPolicy, OtpState};

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

/// Active sessions kept per user; older ones are retired on sign-in.
pub const MAX_SESSIONS_PER_USER: i64 = 10;

#[derive(Clone)]
pub struct Authenticator {
    pool: SqlitePool,
    session_ttl: Duration,
    session_extension: Duration,
    otp_policy: OtpPolicy,
    jwt: JwtManager,
    mailer: Mailer,
    google: Option<GoogleVerifier>,
}

impl Authenticator {
    pub fn new(
        pool: SqlitePool,
        auth: &AuthConfig,
        otp: &OtpConfig,
        mailer: Mailer,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            pool,
            session_ttl: seconds(auth.session_ttl_seconds),
            session_extension: seconds(auth.session_extension_seconds),
            otp_policy: OtpPolicy::from_config(otp),
            jwt: JwtManager::from_config(auth),
            mailer,
            google: GoogleVerifier::from_config(&auth.google)?,
        })
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    pub fn otp_policy(&self) -> &OtpPolicy {
        &self.otp_policy
    }

    pub fn google_enabled(&self) -> bool {
        self.google.is_some()
    }

    pub fn google_code_flow_enabled(&self) -> bool {
        self.google
            .as_ref()
            .is_some_and(GoogleVerifier::code_flow_enabled)
    }

    fn google(&self) -> Result<&GoogleVerifier, AuthError> {
        self.google.as_ref().ok_or(AuthError::GoogleOauthDisabled)
    }
}

pub(crate) fn new_public_id() -> String {
    CUID.create_id()
}

pub(crate) fn generate_session_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Seconds from configuration, bounded to what `chrono::Duration` can hold.
pub(crate) fn seconds(value: u64) -> Duration {
    const MAX: i64 = i64::MAX / 1_000;
    Duration::seconds(i64::try_from(value).map_or(MAX, |secs| secs.min(MAX)))
}
