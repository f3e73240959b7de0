use chrono::Utc;
use sqlx::Row;
use tracing::{debug, info, warn};
use wellzo_database::{format_timestamp, WriteTransaction};

use crate::error::AuthError;
use crate::google::GoogleProfile;
use crate::jwt::TokenType;
use crate::models::{
    AuthOutcome, AuthProvider, DeviceInfo, TokenPair, User, UserSession, SESSION_COLUMNS,
};
use crate::password::verify_password;
use crate::validation::normalize_email;
use crate::{generate_session_key, new_public_id, Authenticator, MAX_SESSIONS_PER_USER};

impl Authenticator {
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device: DeviceInfo,
    ) -> Result<AuthOutcome, AuthError> {
        let email = normalize_email(email);
        let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(AuthError::InvalidCredentials);
        };

        let Some(hash) = row.try_get::<Option<String>, _>("password_hash")? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &hash)? {
            warn!(email = %email, "failed password login");
            return Err(AuthError::InvalidCredentials);
        }

        let user = self.user_by_id(row.try_get("id")?).await?;
        if !user.is_verified {
            return Err(AuthError::AccountNotVerified);
        }
        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        self.open_session(&user, AuthProvider::Password, device).await
    }

    /// Sign in with an ID token obtained by a Google client library.
    pub async fn google_login(
        &self,
        id_token: &str,
        device: DeviceInfo,
    ) -> Result<AuthOutcome, AuthError> {
        let profile = self.google()?.verify_id_token(id_token).await?;
        let user = self.upsert_google_user(profile).await?;
        self.open_session(&user, AuthProvider::Google, device).await
    }

    pub fn google_authorization_url(
        &self,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String, AuthError> {
        self.google()?.authorize_url(state, redirect_uri)
    }

    pub async fn google_callback(
        &self,
        code: &str,
        redirect_uri: &str,
        device: DeviceInfo,
    ) -> Result<AuthOutcome, AuthError> {
        let profile = self.google()?.exchange_code(code, redirect_uri).await?;
        let user = self.upsert_google_user(profile).await?;
        self.open_session(&user, AuthProvider::Google, device).await
    }

    /// Find the account behind a Google identity, linking by email or
    /// creating a passwordless one when needed.
    pub async fn upsert_google_user(&self, profile: GoogleProfile) -> Result<User, AuthError> {
        let email = normalize_email(&profile.email);
        let now = format_timestamp(Utc::now());
        let mut tx = WriteTransaction::begin(&self.pool).await?;

        let by_google = sqlx::query("SELECT id FROM users WHERE google_id = ?")
            .bind(&profile.sub)
            .fetch_optional(&mut *tx)
            .await?;

        let user_id = if let Some(row) = by_google {
            let user_id: i64 = row.try_get("id")?;
            sqlx::query(
                "UPDATE users SET name = COALESCE(?, name), \
                 profile_picture_url = COALESCE(?, profile_picture_url), updated_at = ? WHERE id = ?",
            )
            .bind(profile.name.as_deref())
            .bind(profile.picture.as_deref())
            .bind(&now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
            user_id
        } else if let Some(row) = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&mut *tx)
            .await?
        {
            let user_id: i64 = row.try_get("id")?;
            sqlx::query(
                "UPDATE users SET google_id = ?, \
                 profile_picture_url = COALESCE(profile_picture_url, ?), \
                 is_active = CASE WHEN is_verified = 1 THEN is_active ELSE 1 END, \
                 is_verified = 1, updated_at = ? WHERE id = ?",
            )
            .bind(&profile.sub)
            .bind(profile.picture.as_deref())
            .bind(&now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
            info!(user_id, "linked google identity to existing account");
            user_id
        } else {
            let name = profile
                .name
                .clone()
                .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
            let user_id = sqlx::query(
                "INSERT INTO users (public_id, email, name, password_hash, role, is_active, \
                 is_verified, google_id, profile_picture_url, created_at, updated_at) \
                 VALUES (?, ?, ?, NULL, 'student', 1, 1, ?, ?, ?, ?)",
            )
            .bind(new_public_id())
            .bind(&email)
            .bind(&name)
            .bind(&profile.sub)
            .bind(profile.picture.as_deref())
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            sqlx::query(
                "INSERT INTO user_profiles (user_id, full_name, profile_picture, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(&name)
            .bind(profile.picture.as_deref())
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            info!(user_id, "created account from google sign-in");
            user_id
        };

        tx.commit().await?;

        let user = self.user_by_id(user_id).await?;
        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }
        Ok(user)
    }

    /// Record a new session for the user and mint its token pair.
    pub(crate) async fn open_session(
        &self,
        user: &User,
        provider: AuthProvider,
        device: DeviceInfo,
    ) -> Result<AuthOutcome, AuthError> {
        let now = Utc::now();
        let expires_at = now + self.session_ttl;
        let public_id = new_public_id();
        let session_key = generate_session_key();

        let mut tx = WriteTransaction::begin(&self.pool).await?;

        sqlx::query(
            "INSERT INTO user_sessions (public_id, session_key, user_id, provider, user_agent, \
             ip_address, device_name, created_at, expires_at, last_accessed_at, is_active) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&public_id)
        .bind(&session_key)
        .bind(user.id)
        .bind(provider.as_str())
        .bind(device.user_agent.as_deref())
        .bind(device.ip_address.as_deref())
        .bind(device.device_name.as_deref())
        .bind(format_timestamp(now))
        .bind(format_timestamp(expires_at))
        .bind(format_timestamp(now))
        .execute(&mut *tx)
        .await?;

        let retired = sqlx::query(
            "UPDATE user_sessions SET is_active = 0 WHERE user_id = ? AND is_active = 1 AND id NOT IN \
             (SELECT id FROM user_sessions WHERE user_id = ? AND is_active = 1 \
              ORDER BY created_at DESC, id DESC LIMIT ?)",
        )
        .bind(user.id)
        .bind(user.id)
        .bind(MAX_SESSIONS_PER_USER)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(format_timestamp(now))
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if retired > 0 {
            debug!(user_id = user.id, retired, "retired oldest sessions");
        }
        info!(user_id = user.id, provider = provider.as_str(), "session opened");

        let session = self.session_by_key(&session_key).await?;
        let tokens = self.issue_tokens(user, &session, true)?;
        let profile = self.get_profile(user.id).await?;
        let user = self.user_by_id(user.id).await?;

        Ok(AuthOutcome {
            user,
            tokens,
            session,
            profile,
        })
    }

    /// Resolve a bearer access token to its user and live session.
    pub async fn authenticate(&self, access_token: &str) -> Result<(User, UserSession), AuthError> {
        let claims = self.jwt.validate_token(access_token, TokenType::Access)?;
        let session = self.live_session(&claims.session_id).await?;

        let user = self
            .user_by_public_id(&claims.sub)
            .await?
            .ok_or(AuthError::InvalidSession)?;
        if user.id != session.user_id {
            return Err(AuthError::InvalidSession);
        }
        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        sqlx::query("UPDATE user_sessions SET last_accessed_at = ? WHERE id = ?")
            .bind(format_timestamp(Utc::now()))
            .bind(session.row_id)
            .execute(&self.pool)
            .await?;

        Ok((user, session))
    }

    /// Exchange a refresh token for a new access token on the same session.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.jwt.validate_token(refresh_token, TokenType::Refresh)?;
        let session = self.live_session(&claims.session_id).await?;
        let user = self
            .user_by_public_id(&claims.sub)
            .await?
            .filter(|user| user.id == session.user_id && user.is_active)
            .ok_or(AuthError::InvalidSession)?;

        let mut tokens = self.issue_tokens(&user, &session, false)?;
        tokens.refresh = refresh_token.to_string();
        Ok(tokens)
    }

    /// Push the session expiry forward. Expired sessions are closed instead.
    pub async fn extend_session(&self, session_key: &str) -> Result<UserSession, AuthError> {
        let session = self.session_by_key(session_key).await?;
        if !session.is_active {
            return Err(AuthError::InvalidSession);
        }

        let now = Utc::now();
        if session.is_expired(now) {
            self.invalidate_session(session.row_id).await?;
            return Err(AuthError::SessionExpired);
        }

        let extended = session.expires_at.max(now) + self.session_extension;
        let updated = sqlx::query(
            "UPDATE user_sessions SET expires_at = ?, last_accessed_at = ? \
             WHERE id = ? AND is_active = 1 AND expires_at = ?",
        )
        .bind(format_timestamp(extended))
        .bind(format_timestamp(now))
        .bind(session.row_id)
        .bind(format_timestamp(session.expires_at))
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            // a concurrent extension already moved it
            return self.session_by_key(session_key).await;
        }

        debug!(session = %session.public_id, expires_at = %extended, "session extended");
        self.session_by_key(session_key).await
    }

    pub async fn logout(&self, session_key: &str) -> Result<(), AuthError> {
        let session = self.session_by_key(session_key).await?;
        self.invalidate_session(session.row_id).await?;
        info!(user_id = session.user_id, "session closed");
        Ok(())
    }

    pub async fn list_sessions(&self, user_id: i64) -> Result<Vec<UserSession>, AuthError> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM user_sessions \
             WHERE user_id = ? AND is_active = 1 AND expires_at > ? \
             ORDER BY last_accessed_at DESC"
        ))
        .bind(user_id)
        .bind(format_timestamp(Utc::now()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(UserSession::from_row)
            .collect::<Result<_, _>>()
            .map_err(AuthError::from)
    }

    /// Close every session whose expiry has passed. Returns how many.
    pub async fn prune_expired_sessions(&self) -> Result<u64, AuthError> {
        let pruned = sqlx::query(
            "UPDATE user_sessions SET is_active = 0 WHERE is_active = 1 AND expires_at <= ?",
        )
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?
        .rows_affected();

        info!(pruned, "expired sessions pruned");
        Ok(pruned)
    }

    pub async fn session_by_key(&self, session_key: &str) -> Result<UserSession, AuthError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM user_sessions WHERE session_key = ?"
        ))
        .bind(session_key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AuthError::SessionNotFound)?;

        Ok(UserSession::from_row(&row)?)
    }

    async fn live_session(&self, session_key: &str) -> Result<UserSession, AuthError> {
        let session = self.session_by_key(session_key).await?;
        if !session.is_active {
            return Err(AuthError::InvalidSession);
        }
        if session.is_expired(Utc::now()) {
            self.invalidate_session(session.row_id).await?;
            return Err(AuthError::SessionExpired);
        }
        Ok(session)
    }

    async fn invalidate_session(&self, row_id: i64) -> Result<(), AuthError> {
        sqlx::query("UPDATE user_sessions SET is_active = 0 WHERE id = ?")
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn issue_tokens(
        &self,
        user: &User,
        session: &UserSession,
        with_refresh: bool,
    ) -> Result<TokenPair, AuthError> {
        let (access, access_expires_at) = self.jwt.generate_token(
            &user.public_id,
            &session.session_key,
            user.role.as_str(),
            TokenType::Access,
        )?;

        let refresh = if with_refresh {
            self.jwt
                .generate_token(
                    &user.public_id,
                    &session.session_key,
                    user.role.as_str(),
                    TokenType::Refresh,
                )?
                .0
        } else {
            String::new()
        };

        Ok(TokenPair {
            access,
            refresh,
            access_expires_at,
        })
    }
}
