//! Signed access and refresh tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use wellzo_config::AuthConfig;

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub nbf: usize,
    pub iss: String,
    pub aud: String,
    pub jti: String,
    pub session_id: String,
    pub user_role: String,
    pub token_type: TokenType,
}

#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, issuer: String, audience: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            access_ttl: Duration::hours(1),
            refresh_ttl: Duration::days(7),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            config.jwt_issuer.clone(),
            config.jwt_audience.clone(),
        )
        .with_durations(
            crate::seconds(config.access_token_ttl_seconds),
            crate::seconds(config.refresh_token_ttl_seconds),
        )
    }

    pub fn with_durations(mut self, access: Duration, refresh: Duration) -> Self {
        self.access_ttl = access;
        self.refresh_ttl = refresh;
        self
    }

    /// Returns the encoded token and its expiry.
    pub fn generate_token(
        &self,
        user_id: &str,
        session_id: &str,
        user_role: &str,
        token_type: TokenType,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let expires_at = now + ttl;

        let claims = Claims {
            sub: user_id.to_string(),
            exp: unix(expires_at),
            iat: unix(now),
            nbf: unix(now),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            user_role: user_role.to_string(),
            token_type,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AuthError::Token(format!("failed to encode token: {err}")))?;
        Ok((token, expires_at))
    }

    /// Validate signature, issuer, audience, expiry and the expected token type.
    pub fn validate_token(&self, token: &str, expected: TokenType) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|err| AuthError::Token(err.to_string()))?
            .claims;

        if claims.token_type != expected {
            return Err(AuthError::Token("unexpected token type".to_string()));
        }

        Ok(claims)
    }
}

fn unix(value: DateTime<Utc>) -> usize {
    usize::try_from(value.timestamp()).unwrap_or_default()
}
