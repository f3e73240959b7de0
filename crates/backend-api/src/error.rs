use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;
use wellzo_auth::{AuthError, OtpError};
use wellzo_social::SocialError;
use wellzo_wearables::WearableError;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub errors: Option<BTreeMap<String, String>>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Option<BTreeMap<String, String>>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: None,
        }
    }

    pub fn with_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors
            .get_or_insert_with(BTreeMap::new)
            .insert(field.into(), message.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal_server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            success: false,
            message: self.message,
            errors: self.errors,
        });
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        error!(error = ?error, "internal error");
        Self::internal_server_error()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "Invalid request body").with_error("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("Invalid query parameters").with_error("query", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request("Invalid path parameter").with_error("path", rejection.body_text())
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let status = match &error {
            AuthError::Otp(OtpError::Blocked { .. }) | AuthError::OtpContention => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AuthError::UserExists
            | AuthError::AlreadyVerified
            | AuthError::Validation(_)
            | AuthError::Otp(_)
            | AuthError::GoogleOauthDisabled
            | AuthError::GoogleToken(_)
            | AuthError::GoogleOauth(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::AccountNotVerified
            | AuthError::AccountInactive
            | AuthError::Token(_)
            | AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::InvalidSession => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound | AuthError::ProfileNotFound => StatusCode::NOT_FOUND,
            AuthError::Mail(_) | AuthError::Database(_) | AuthError::PasswordHash(_) => {
                error!(error = ?error, "auth error");
                return Self::internal_server_error();
            }
        };

        warn!(status = status.as_u16(), error = %error, "auth request rejected");
        let retry_after = error.retry_after();
        let mut api_error = Self::new(status, error.to_string());
        if let AuthError::Validation(message) = &error {
            api_error = api_error.with_error("detail", message.clone());
        }
        if let Some(until) = retry_after {
            api_error = api_error.with_error("retry_after", until.to_rfc3339());
        }
        api_error
    }
}

impl From<SocialError> for ApiError {
    fn from(error: SocialError) -> Self {
        match error {
            SocialError::Validation(message) => Self::bad_request(message),
            SocialError::NotFound(_) => Self::not_found(error.to_string()),
            SocialError::Forbidden(message) => Self::forbidden(message),
            SocialError::Database(_) | SocialError::Serialization(_) => {
                error!(error = ?error, "social error");
                Self::internal_server_error()
            }
        }
    }
}

impl From<WearableError> for ApiError {
    fn from(error: WearableError) -> Self {
        if error.is_unavailable() {
            warn!(error = %error, "bluetooth unavailable");
            return Self::new(StatusCode::SERVICE_UNAVAILABLE, error.to_string());
        }
        match error {
            WearableError::Validation(message) => Self::bad_request(message),
            WearableError::NotFound => Self::not_found(error.to_string()),
            WearableError::NoReadings | WearableError::Ble(_) => {
                warn!(error = %error, "wearable collection failed");
                Self::bad_request(error.to_string())
            }
            WearableError::Database(_) => {
                error!(error = ?error, "wearable error");
                Self::internal_server_error()
            }
        }
    }
}
