//! Google sign-in: ID token verification and the authorization-code flow.

use anyhow::Context;
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::debug;
use wellzo_config::GoogleAuthConfig;

use crate::error::AuthError;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const ALLOWED_ISSUERS: &[&str] = &["accounts.google.com", "https://accounts.google.com"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Clone)]
pub struct GoogleVerifier {
    client_id: String,
    tokeninfo_url: String,
    userinfo_url: String,
    http: reqwest::Client,
    oauth: Option<BasicClient>,
}

#[derive(Deserialize)]
struct TokenInfo {
    iss: String,
    aud: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<serde_json::Value>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleVerifier {
    /// `None` when no client id is configured.
    pub fn from_config(config: &GoogleAuthConfig) -> Result<Option<Self>, AuthError> {
        let Some(client_id) = config.client_id.clone() else {
            return Ok(None);
        };

        let oauth = match config.client_secret.clone() {
            Some(secret) => Some(BasicClient::new(
                ClientId::new(client_id.clone()),
                Some(ClientSecret::new(secret)),
                AuthUrl::new(GOOGLE_AUTH_URL.to_string()).context("invalid google auth url")?,
                Some(TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).context("invalid google token url")?),
            )),
            None => None,
        };

        let http = reqwest::Client::builder()
            .user_agent("wellzo-backend")
            .build()
            .context("failed to build google http client")?;

        Ok(Some(Self {
            client_id,
            tokeninfo_url: config.tokeninfo_url.clone(),
            userinfo_url: config.userinfo_url.clone(),
            http,
            oauth,
        }))
    }

    pub fn code_flow_enabled(&self) -> bool {
        self.oauth.is_some()
    }

    /// Ask Google to validate an ID token and check it was minted for us.
    pub async fn verify_id_token(&self, id_token: &str) -> Result<GoogleProfile, AuthError> {
        let response = self
            .http
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .context("failed to reach google tokeninfo endpoint")?;

        if !response.status().is_success() {
            return Err(AuthError::GoogleToken(format!(
                "tokeninfo rejected the token ({})",
                response.status()
            )));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|err| AuthError::GoogleToken(format!("unreadable tokeninfo response: {err}")))?;

        if info.aud != self.client_id {
            return Err(AuthError::GoogleToken("token audience mismatch".to_string()));
        }

        if !ALLOWED_ISSUERS.contains(&info.iss.as_str()) {
            return Err(AuthError::GoogleToken("Wrong issuer.".to_string()));
        }

        let verified = match &info.email_verified {
            Some(serde_json::Value::Bool(value)) => *value,
            Some(serde_json::Value::String(value)) => value == "true",
            _ => false,
        };

        let email = info
            .email
            .filter(|_| verified)
            .ok_or_else(|| AuthError::GoogleToken("token has no verified email".to_string()))?;

        debug!(sub = %info.sub, "verified google id token");

        Ok(GoogleProfile {
            sub: info.sub,
            email,
            name: info.name,
            picture: info.picture,
        })
    }

    pub fn authorize_url(&self, state: &str, redirect_uri: &str) -> Result<String, AuthError> {
        let oauth = self.oauth.as_ref().ok_or(AuthError::GoogleOauthDisabled)?;
        let redirect = RedirectUrl::new(redirect_uri.to_owned())
            .context("invalid redirect uri for google oauth")?;

        let (url, _) = oauth
            .clone()
            .set_redirect_uri(redirect)
            .authorize_url(|| CsrfToken::new(state.to_owned()))
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .url();

        Ok(url.to_string())
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<GoogleProfile, AuthError> {
        let oauth = self.oauth.as_ref().ok_or(AuthError::GoogleOauthDisabled)?;
        let redirect = RedirectUrl::new(redirect_uri.to_owned())
            .context("invalid redirect uri for google oauth")?;

        let token = oauth
            .clone()
            .set_redirect_uri(redirect)
            .exchange_code(AuthorizationCode::new(code.to_owned()))
            .request_async(async_http_client)
            .await
            .context("failed to exchange google oauth code")?;

        let user: UserInfo = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(token.access_token().secret())
            .send()
            .await
            .context("failed to call google userinfo endpoint")?
            .error_for_status()
            .context("google userinfo endpoint returned an error")?
            .json()
            .await
            .context("failed to decode google userinfo response")?;

        let email = user
            .email
            .ok_or_else(|| AuthError::GoogleToken("google account has no email".to_string()))?;

        Ok(GoogleProfile {
            sub: user.sub,
            email,
            name: user.name,
            picture: user.picture,
        })
    }
}
