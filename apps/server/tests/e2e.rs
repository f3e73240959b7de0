use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method, Request, StatusCode,
    },
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::{Row, SqlitePool};
use tempfile::TempDir;
use tower::ServiceExt;
use wellzo_api::{build_router, AppState};
use wellzo_config::AppConfig;
use wellzo_runtime::BackendServices;

type TestResult<T = ()> = anyhow::Result<T>;

struct TestApp {
    router: Router,
    pool: SqlitePool,
    _db_dir: TempDir,
}

struct TestResponse {
    status: StatusCode,
    body: Value,
}

struct Member {
    public_id: String,
    access: String,
    refresh: String,
}

impl TestApp {
    async fn new() -> TestResult<Self> {
        let db_dir = TempDir::new()?;
        let db_path = db_dir.path().join("wellzo-test.db");

        let mut config = AppConfig::default();
        config.database.url = format!("sqlite://{}", db_path.to_string_lossy());
        config.database.max_connections = 5;
        config.cache.redis_url = None;
        config.email.enabled = false;

        let services = BackendServices::initialise(&config).await?;
        let state = AppState::new(
            services.authenticator.clone(),
            services.social.clone(),
            services.wearables.clone(),
        );

        Ok(Self {
            router: build_router(state),
            pool: services.db_pool.clone(),
            _db_dir: db_dir,
        })
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResult<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json_body) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json_body)?)
            }
            None => Body::empty(),
        };

        let response = self.router.clone().oneshot(builder.body(body)?).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(TestResponse { status, body })
    }

    async fn code_for(&self, email: &str) -> TestResult<String> {
        let row = sqlx::query("SELECT otp_code FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        row.try_get::<Option<String>, _>("otp_code")?
            .ok_or_else(|| anyhow::anyhow!("no pending code for {email}"))
    }

    async fn join(&self, email: &str, name: &str, password: &str) -> TestResult<Member> {
        let registered = self
            .request(
                Method::POST,
                "/api/auth/register",
                Some(json!({ "email": email, "name": name, "password": password })),
                None,
            )
            .await?;
        assert_eq!(registered.status, StatusCode::CREATED, "{}", registered.body);

        let code = self.code_for(email).await?;
        let verified = self
            .request(
                Method::POST,
                "/api/auth/verify-otp",
                Some(json!({ "email": email, "otp": code, "device_name": "Pixel" })),
                None,
            )
            .await?;
        assert_eq!(verified.status, StatusCode::OK, "{}", verified.body);

        let text = |pointer: &str| {
            verified
                .body
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("{pointer} missing in {}", verified.body))
        };
        Ok(Member {
            public_id: text("/user/public_id")?,
            access: text("/tokens/access")?,
            refresh: text("/tokens/refresh")?,
        })
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn password_reset_closes_sessions_and_accepts_the_new_password() -> TestResult {
    let app = TestApp::new().await?;
    let member = app
        .join("reset@example.com", "Reset Me", "first-pass-123")
        .await?;

    let requested = app
        .request(
            Method::POST,
            "/api/auth/password-reset/request",
            Some(json!({ "email": "reset@example.com" })),
            None,
        )
        .await?;
    assert_eq!(requested.status, StatusCode::OK);

    let code = app.code_for("reset@example.com").await?;
    let confirmed = app
        .request(
            Method::POST,
            "/api/auth/password-reset/confirm",
            Some(json!({
                "email": "reset@example.com",
                "otp": code,
                "new_password": "second-pass-456"
            })),
            None,
        )
        .await?;
    assert_eq!(confirmed.status, StatusCode::OK, "{}", confirmed.body);

    let stale = app
        .request(Method::GET, "/api/profile", None, Some(&member.access))
        .await?;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);

    let old = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "reset@example.com", "password": "first-pass-123" })),
            None,
        )
        .await?;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);

    let fresh = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "reset@example.com", "password": "second-pass-456" })),
            None,
        )
        .await?;
    assert_eq!(fresh.status, StatusCode::OK);
    assert!(fresh.body["tokens"]["access"].is_string());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn refresh_and_extend_keep_the_session_alive() -> TestResult {
    let app = TestApp::new().await?;
    let member = app.join("keep@example.com", "Keeper", "keep-going-1").await?;

    let refreshed = app
        .request(
            Method::POST,
            "/api/auth/token/refresh",
            Some(json!({ "refresh": member.refresh })),
            None,
        )
        .await?;
    assert_eq!(refreshed.status, StatusCode::OK, "{}", refreshed.body);
    let access = refreshed.body["access"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("no access token"))?
        .to_string();

    let extended = app
        .request(Method::POST, "/api/auth/session/extend", None, Some(&access))
        .await?;
    assert_eq!(extended.status, StatusCode::OK, "{}", extended.body);
    assert_eq!(extended.body["success"], true);
    assert!(extended.body["expires_at"].is_string());

    let bogus = app
        .request(
            Method::POST,
            "/api/auth/token/refresh",
            Some(json!({ "refresh": access })),
            None,
        )
        .await?;
    assert_eq!(bogus.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn following_shapes_profiles_and_suggestions() -> TestResult {
    let app = TestApp::new().await?;
    let asha = app.join("asha@example.com", "Asha", "namaste-123").await?;
    let ravi = app.join("ravi@example.com", "Ravi", "namaste-456").await?;

    let suggested = app
        .request(Method::GET, "/api/social/users/suggested", None, Some(&asha.access))
        .await?;
    assert_eq!(suggested.status, StatusCode::OK);
    assert!(suggested.body.as_array().is_some_and(|users| users
        .iter()
        .any(|entry| entry["user"]["id"] == ravi.public_id.as_str())));

    let followed = app
        .request(
            Method::POST,
            &format!("/api/social/users/{}/follow", ravi.public_id),
            None,
            Some(&asha.access),
        )
        .await?;
    assert_eq!(followed.status, StatusCode::OK);
    assert_eq!(followed.body["following"], true);

    let profile = app
        .request(
            Method::GET,
            &format!("/api/social/users/{}/profile", ravi.public_id),
            None,
            Some(&asha.access),
        )
        .await?;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.body["followers_count"], 1);
    assert_eq!(profile.body["is_following"], true);

    let notifications = app
        .request(Method::GET, "/api/social/notifications", None, Some(&ravi.access))
        .await?;
    assert_eq!(notifications.status, StatusCode::OK);
    assert_eq!(notifications.body["count"], 1);
    assert_eq!(notifications.body["results"][0]["notification_type"], "follow");

    let marked = app
        .request(
            Method::POST,
            "/api/social/notifications/read-all",
            None,
            Some(&ravi.access),
        )
        .await?;
    assert_eq!(marked.body["updated"], 1);

    let myself = app
        .request(
            Method::POST,
            &format!("/api/social/users/{}/follow", asha.public_id),
            None,
            Some(&asha.access),
        )
        .await?;
    assert_eq!(myself.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn deleting_an_account_requires_the_password() -> TestResult {
    let app = TestApp::new().await?;
    let member = app.join("bye@example.com", "Leaving", "farewell-99").await?;

    let refused = app
        .request(
            Method::DELETE,
            "/api/auth/account",
            Some(json!({ "password": "wrong-password" })),
            Some(&member.access),
        )
        .await?;
    assert_eq!(refused.status, StatusCode::UNAUTHORIZED);

    let deleted = app
        .request(
            Method::DELETE,
            "/api/auth/account",
            Some(json!({ "password": "farewell-99" })),
            Some(&member.access),
        )
        .await?;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind("bye@example.com")
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(remaining, 0);
    Ok(())
}
