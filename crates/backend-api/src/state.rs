use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration, time::Instant};

use axum::http::HeaderMap;
use rand::{distributions::Alphanumeric, Rng};
use tokio::sync::Mutex;
use wellzo_auth::{Authenticator, User, UserSession};
use wellzo_social::SocialService;
use wellzo_wearables::WearableService;

use crate::util::require_bearer;
use crate::ApiError;

const DEFAULT_OAUTH_STATE_TTL: StdDuration = StdDuration::from_secs(600);

#[derive(Clone)]
pub struct AppState {
    authenticator: Authenticator,
    social: SocialService,
    wearables: WearableService,
    oauth_state: OAuthStateStore,
}

impl AppState {
    pub fn new(
        authenticator: Authenticator,
        social: SocialService,
        wearables: WearableService,
    ) -> Self {
        Self::with_oauth_store(authenticator, social, wearables, OAuthStateStore::default())
    }

    pub fn with_oauth_store(
        authenticator: Authenticator,
        social: SocialService,
        wearables: WearableService,
        oauth_state: OAuthStateStore,
    ) -> Self {
        Self {
            authenticator,
            social,
            wearables,
            oauth_state,
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn social(&self) -> &SocialService {
        &self.social
    }

    pub fn wearables(&self) -> &WearableService {
        &self.wearables
    }

    pub fn oauth_state(&self) -> &OAuthStateStore {
        &self.oauth_state
    }

    pub async fn authenticate(&self, token: &str) -> Result<(User, UserSession), ApiError> {
        self.authenticator
            .authenticate(token)
            .await
            .map_err(ApiError::from)
    }

    /// Resolve the caller from the `Authorization: Bearer` header.
    pub async fn current_user(&self, headers: &HeaderMap) -> Result<(User, UserSession), ApiError> {
        let token = require_bearer(headers)?;
        self.authenticate(&token).await
    }
}

/// Pending OAuth `state` values, each bound to the redirect URI it was
/// issued for. Entries are single use and expire after the TTL.
#[derive(Clone)]
pub struct OAuthStateStore {
    inner: Arc<Mutex<HashMap<String, (Instant, String)>>>,
    ttl: StdDuration,
}

impl OAuthStateStore {
    pub fn new(ttl: StdDuration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn issue(&self, redirect_uri: &str) -> String {
        let state = Self::random_state();
        self.store(state.clone(), redirect_uri.to_string()).await;
        state
    }

    pub async fn store(&self, state: String, redirect_uri: String) {
        let mut guard = self.inner.lock().await;
        Self::prune(&mut guard, self.ttl);
        guard.insert(state, (Instant::now(), redirect_uri));
    }

    /// Take the state if it is live and was issued for `redirect_uri`.
    pub async fn consume(&self, state: &str, redirect_uri: &str) -> bool {
        let mut guard = self.inner.lock().await;
        Self::prune(&mut guard, self.ttl);
        match guard.remove(state) {
            Some((_, issued_for)) => issued_for == redirect_uri,
            None => false,
        }
    }

    fn random_state() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    }

    fn prune(map: &mut HashMap<String, (Instant, String)>, ttl: StdDuration) {
        let now = Instant::now();
        map.retain(|_, (created, _)| now.duration_since(*created) <= ttl);
    }
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new(DEFAULT_OAUTH_STATE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration};

    const REDIRECT: &str = "https://app.wellzo.test/auth/google";

    #[tokio::test]
    async fn oauth_state_is_single_use() {
        let store = OAuthStateStore::new(Duration::from_secs(60));
        let state = store.issue(REDIRECT).await;

        assert_eq!(state.len(), 32);
        assert!(store.consume(&state, REDIRECT).await);
        assert!(!store.consume(&state, REDIRECT).await);
    }

    #[tokio::test]
    async fn oauth_state_is_bound_to_redirect() {
        let store = OAuthStateStore::default();
        let state = store.issue(REDIRECT).await;

        assert!(!store.consume(&state, "https://evil.test/cb").await);
        assert!(!store.consume(&state, REDIRECT).await);
    }

    #[tokio::test]
    async fn oauth_state_expires_after_ttl() {
        let store = OAuthStateStore::new(Duration::from_millis(10));
        store
            .store("expired-state".to_string(), REDIRECT.to_string())
            .await;

        sleep(Duration::from_millis(25)).await;

        assert!(!store.consume("expired-state", REDIRECT).await);
    }
}
