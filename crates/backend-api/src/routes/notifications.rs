use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use wellzo_social::{MarkedRead, Notification, Page, UnreadCount};

use crate::{
    routes::page_request,
    util::ApiQuery,
    ApiError, AppState,
};

/// Paginated notifications, newest first.
#[derive(ToSchema)]
pub struct NotificationPage {
    pub count: i64,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<Notification>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct NotificationQuery {
    /// Comma separated notification ids to mark read before listing.
    pub mark_read: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/api/social/notifications",
    tag = "Notifications",
    security(("bearerAuth" = [])),
    params(NotificationQuery),
    responses(
        (status = 200, description = "Notifications", body = NotificationPage),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<NotificationQuery>,
) -> Result<Json<Page<Notification>>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let page = state
        .social()
        .list_notifications(
            user.id,
            query.mark_read.as_deref(),
            page_request(query.page, query.page_size),
        )
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/api/social/notifications/unread-count",
    tag = "Notifications",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Unread notifications", body = UnreadCount),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UnreadCount>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    Ok(Json(state.social().unread_count(user.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/social/notifications/read-all",
    tag = "Notifications",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Notifications marked read", body = MarkedRead),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MarkedRead>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    Ok(Json(state.social().mark_all_read(user.id).await?))
}
