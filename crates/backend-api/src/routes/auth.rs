use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use wellzo_auth::{AuthError, AuthOutcome, Registration, TokenPair, User, UserSession};

use crate::{
    routes::MessageResponse,
    util::{device_info, ApiJson, ApiQuery},
    ApiError, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: User,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
    #[serde(default)]
    pub device_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub device_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GoogleLoginRequest {
    /// ID token issued to the client by Google.
    #[serde(alias = "id_token")]
    pub token: String,
    #[serde(default)]
    pub device_name: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct GoogleAuthorizeQuery {
    pub redirect_uri: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GoogleAuthorizeResponse {
    pub authorize_url: String,
    pub state: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GoogleCallbackRequest {
    pub code: String,
    pub state: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub device_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmPasswordResetRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExtendSessionResponse {
    pub success: bool,
    pub message: String,
    pub expires_at: DateTime<Utc>,
    pub session: UserSession,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionsResponse {
    pub sessions: Vec<UserSession>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DeleteAccountRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = Registration,
    responses(
        (status = 201, description = "Account created, verification code sent", body = RegisterResponse),
        (status = 400, description = "Invalid registration", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<Registration>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let user = state.authenticator().register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "Registration successful. Check your email for the verification code."
                .to_string(),
            user,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    tag = "Auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Account verified and signed in", body = AuthOutcome),
        (status = 400, description = "Invalid or expired code", body = crate::error::ErrorResponse),
        (status = 429, description = "Too many attempts", body = crate::error::ErrorResponse)
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<VerifyOtpRequest>,
) -> Result<Json<AuthOutcome>, ApiError> {
    let device = device_info(&headers, payload.device_name);
    let outcome = state
        .authenticator()
        .verify_otp(&payload.email, &payload.otp, device)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-otp",
    tag = "Auth",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "New code sent", body = MessageResponse),
        (status = 400, description = "Account already verified", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown email", body = crate::error::ErrorResponse),
        (status = 429, description = "Too many attempts", body = crate::error::ErrorResponse)
    )
)]
pub async fn resend_otp(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.authenticator().resend_otp(&payload.email).await?;
    Ok(Json(MessageResponse::ok("A new verification code has been sent")))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthOutcome),
        (status = 401, description = "Invalid credentials or unverified account", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthOutcome>, ApiError> {
    let device = device_info(&headers, payload.device_name);
    let outcome = state
        .authenticator()
        .login(&payload.email, &payload.password, device)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/auth/google",
    tag = "Auth",
    request_body = GoogleLoginRequest,
    responses(
        (status = 200, description = "Signed in with Google", body = AuthOutcome),
        (status = 400, description = "Invalid token or Google sign-in disabled", body = crate::error::ErrorResponse)
    )
)]
pub async fn google_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<GoogleLoginRequest>,
) -> Result<Json<AuthOutcome>, ApiError> {
    let device = device_info(&headers, payload.device_name);
    let outcome = state
        .authenticator()
        .google_login(&payload.token, device)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/api/auth/google/authorize",
    tag = "Auth",
    params(GoogleAuthorizeQuery),
    responses(
        (status = 200, description = "Google authorization URL", body = GoogleAuthorizeResponse),
        (status = 400, description = "Google sign-in disabled", body = crate::error::ErrorResponse)
    )
)]
pub async fn google_authorize(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<GoogleAuthorizeQuery>,
) -> Result<Json<GoogleAuthorizeResponse>, ApiError> {
    if !state.authenticator().google_code_flow_enabled() {
        return Err(AuthError::GoogleOauthDisabled.into());
    }

    let oauth_state = state.oauth_state().issue(&params.redirect_uri).await;
    let authorize_url = state
        .authenticator()
        .google_authorization_url(&oauth_state, &params.redirect_uri)?;

    Ok(Json(GoogleAuthorizeResponse {
        authorize_url,
        state: oauth_state,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/google/callback",
    tag = "Auth",
    request_body = GoogleCallbackRequest,
    responses(
        (status = 200, description = "Signed in with Google", body = AuthOutcome),
        (status = 400, description = "Unknown state or failed code exchange", body = crate::error::ErrorResponse)
    )
)]
pub async fn google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<GoogleCallbackRequest>,
) -> Result<Json<AuthOutcome>, ApiError> {
    if !state
        .oauth_state()
        .consume(&payload.state, &payload.redirect_uri)
        .await
    {
        return Err(ApiError::bad_request("invalid or expired oauth state"));
    }

    let device = device_info(&headers, payload.device_name);
    let outcome = state
        .authenticator()
        .google_callback(&payload.code, &payload.redirect_uri, device)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/auth/token/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = TokenPair),
        (status = 401, description = "Invalid refresh token or closed session", body = crate::error::ErrorResponse)
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let tokens = state
        .authenticator()
        .refresh_access_token(&payload.refresh)
        .await?;
    Ok(Json(tokens))
}

#[utoipa::path(
    post,
    path = "/api/auth/password-reset/request",
    tag = "Auth",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset code sent", body = MessageResponse),
        (status = 404, description = "Unknown email", body = crate::error::ErrorResponse),
        (status = 429, description = "Too many attempts", body = crate::error::ErrorResponse)
    )
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .authenticator()
        .request_password_reset(&payload.email)
        .await?;
    Ok(Json(MessageResponse::ok("Password reset code sent to your email")))
}

#[utoipa::path(
    post,
    path = "/api/auth/password-reset/confirm",
    tag = "Auth",
    request_body = ConfirmPasswordResetRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid code or weak password", body = crate::error::ErrorResponse),
        (status = 429, description = "Too many attempts", body = crate::error::ErrorResponse)
    )
)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ConfirmPasswordResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .authenticator()
        .confirm_password_reset(&payload.email, &payload.otp, &payload.new_password)
        .await?;
    Ok(Json(MessageResponse::ok(
        "Password has been reset. Please sign in again.",
    )))
}

#[utoipa::path(
    post,
    path = "/api/auth/session/extend",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Session extended", body = ExtendSessionResponse),
        (status = 401, description = "Session missing or expired", body = crate::error::ErrorResponse)
    )
)]
pub async fn extend_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ExtendSessionResponse>, ApiError> {
    let (_, session) = state.current_user(&headers).await?;
    let session = state
        .authenticator()
        .extend_session(&session.session_key)
        .await?;
    Ok(Json(ExtendSessionResponse {
        success: true,
        message: "Session extended".to_string(),
        expires_at: session.expires_at,
        session,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Session closed", body = MessageResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, ApiError> {
    let (user, session) = state.current_user(&headers).await?;
    state.authenticator().logout(&session.session_key).await?;
    info!(user_id = user.id, "user logged out");
    Ok(Json(MessageResponse::ok("Logged out")))
}

#[utoipa::path(
    get,
    path = "/api/auth/sessions",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Active sessions", body = SessionsResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionsResponse>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let sessions = state.authenticator().list_sessions(user.id).await?;
    Ok(Json(SessionsResponse { sessions }))
}

#[utoipa::path(
    delete,
    path = "/api/auth/account",
    tag = "Auth",
    security(("bearerAuth" = [])),
    request_body = DeleteAccountRequest,
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Authentication or password confirmation failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<ApiJson<DeleteAccountRequest>>,
) -> Result<StatusCode, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let ApiJson(payload) = payload.unwrap_or_default();
    let removal = state
        .authenticator()
        .delete_account(&user, payload.password.as_deref())
        .await?;
    state
        .social()
        .refresh_engagement(&removal.touched_posts)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
