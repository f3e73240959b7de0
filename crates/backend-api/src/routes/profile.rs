use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use wellzo_auth::{ProfileUpdate, UserProfile};

use crate::{util::ApiJson, ApiError, AppState};

#[utoipa::path(
    get,
    path = "/api/profile",
    tag = "Profile",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "The caller's profile, created on first access", body = UserProfile),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserProfile>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let profile = state.authenticator().get_profile(user.id).await?;
    Ok(Json(profile))
}

#[utoipa::path(
    put,
    path = "/api/profile",
    tag = "Profile",
    security(("bearerAuth" = [])),
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = UserProfile),
        (status = 400, description = "Invalid profile fields", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let profile = state.authenticator().update_profile(user.id, update).await?;
    Ok(Json(profile))
}

#[utoipa::path(
    delete,
    path = "/api/profile",
    tag = "Profile",
    security(("bearerAuth" = [])),
    responses(
        (status = 204, description = "Profile deleted"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 404, description = "No profile to delete", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    state.authenticator().delete_profile(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
