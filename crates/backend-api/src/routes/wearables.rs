use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use wellzo_social::Page;
use wellzo_wearables::{ConnectedDevice, DiscoveredDevice, NewReading, ReadingUpdate, WearableData};

use crate::{
    routes::page_request,
    util::{ApiJson, ApiPath, ApiQuery},
    ApiError, AppState,
};

/// Paginated readings, newest first.
#[derive(ToSchema)]
pub struct ReadingPage {
    pub count: i64,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<WearableData>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReadingQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CollectRequest {
    #[serde(default)]
    pub device_address: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ConnectRequest {
    #[serde(default)]
    pub address: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/wearables",
    tag = "Wearables",
    security(("bearerAuth" = [])),
    params(ReadingQuery),
    responses(
        (status = 200, description = "Readings of the caller", body = ReadingPage),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_readings(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<ReadingQuery>,
) -> Result<Json<Page<WearableData>>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let request = page_request(query.page, query.page_size);
    let (count, readings) = state
        .wearables()
        .list_readings(user.id, request.limit(), request.offset())
        .await?;
    Ok(Json(Page::new(&request, count, readings)))
}

#[utoipa::path(
    post,
    path = "/api/wearables",
    tag = "Wearables",
    security(("bearerAuth" = [])),
    request_body = NewReading,
    responses(
        (status = 201, description = "Reading stored", body = WearableData),
        (status = 400, description = "Invalid reading", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_reading(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<NewReading>,
) -> Result<(StatusCode, Json<WearableData>), ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let reading = state.wearables().create_reading(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

#[utoipa::path(
    get,
    path = "/api/wearables/{id}",
    tag = "Wearables",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Reading identifier")),
    responses(
        (status = 200, description = "Reading", body = WearableData),
        (status = 404, description = "Reading not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_reading(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    headers: HeaderMap,
) -> Result<Json<WearableData>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    Ok(Json(state.wearables().get_reading(user.id, id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/wearables/{id}",
    tag = "Wearables",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Reading identifier")),
    request_body = ReadingUpdate,
    responses(
        (status = 200, description = "Reading updated", body = WearableData),
        (status = 400, description = "Invalid reading", body = crate::error::ErrorResponse),
        (status = 404, description = "Reading not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_reading(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<ReadingUpdate>,
) -> Result<Json<WearableData>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    Ok(Json(
        state.wearables().update_reading(user.id, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/wearables/{id}",
    tag = "Wearables",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Reading identifier")),
    responses(
        (status = 204, description = "Reading deleted"),
        (status = 404, description = "Reading not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_reading(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    state.wearables().delete_reading(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/wearables/scan",
    tag = "Wearables",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Nearby devices", body = [DiscoveredDevice]),
        (status = 503, description = "Bluetooth unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn scan_devices(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<DiscoveredDevice>>, ApiError> {
    state.current_user(&headers).await?;
    Ok(Json(state.wearables().scan().await?))
}

#[utoipa::path(
    post,
    path = "/api/wearables/collect",
    tag = "Wearables",
    security(("bearerAuth" = [])),
    request_body = CollectRequest,
    responses(
        (status = 201, description = "Reading collected and stored", body = WearableData),
        (status = 400, description = "Missing address or no data", body = crate::error::ErrorResponse),
        (status = 503, description = "Bluetooth unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn collect_reading(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<ApiJson<CollectRequest>>,
) -> Result<(StatusCode, Json<WearableData>), ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let request = payload.map(|ApiJson(body)| body).unwrap_or_default();
    let reading = state
        .wearables()
        .collect(user.id, request.device_address.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

#[utoipa::path(
    post,
    path = "/api/wearables/connect",
    tag = "Wearables",
    security(("bearerAuth" = [])),
    request_body = ConnectRequest,
    responses(
        (status = 200, description = "Device connected", body = ConnectedDevice),
        (status = 400, description = "Missing address", body = crate::error::ErrorResponse),
        (status = 503, description = "Bluetooth unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn connect_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<ApiJson<ConnectRequest>>,
) -> Result<Json<ConnectedDevice>, ApiError> {
    state.current_user(&headers).await?;
    let request = payload.map(|ApiJson(body)| body).unwrap_or_default();
    Ok(Json(
        state
            .wearables()
            .connect_device(request.address.as_deref())
            .await?,
    ))
}
