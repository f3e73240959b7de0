use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use wellzo_social::{
    BookmarkOutcome, Comment, CommentLikeOutcome, CommunityStats, DiscoverSort, FeedSort,
    FollowOutcome, NewPost, Page, Post, PostType, ReactionOutcome, ShareOutcome, SocialProfile,
    SuggestedUser, TrendingTopic, ViewOutcome,
};

use crate::{
    routes::page_request,
    util::{device_info, ApiJson, ApiPath, ApiQuery},
    ApiError, AppState,
};

/// Paginated posts.
#[derive(ToSchema)]
pub struct PostPage {
    pub count: i64,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<Post>,
}

/// Paginated top-level comments with their first replies.
#[derive(ToSchema)]
pub struct CommentPage {
    pub count: i64,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<Comment>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct FeedQuery {
    /// Post category, or `all`.
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    pub sort: Option<FeedSort>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DiscoverQuery {
    /// Matches post content or a hashtag name.
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort: Option<DiscoverSort>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReactionRequest {
    pub reaction_type: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentRequest {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// `None` for an absent or `all` filter.
fn category_filter(value: Option<&str>) -> Result<Option<PostType>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("all") => Ok(None),
        Some(value) => PostType::parse(value)
            .map(Some)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown post type: {value}"))),
    }
}

#[utoipa::path(
    get,
    path = "/api/social/posts",
    tag = "Posts",
    security(("bearerAuth" = [])),
    params(FeedQuery),
    responses(
        (status = 200, description = "Feed page", body = PostPage),
        (status = 400, description = "Unknown filter", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<FeedQuery>,
) -> Result<Json<Page<Post>>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let post_type = category_filter(query.post_type.as_deref())?;
    let page = state
        .social()
        .list_posts(
            user.id,
            post_type,
            query.sort.unwrap_or_default(),
            page_request(query.page, query.page_size),
        )
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/api/social/posts",
    tag = "Posts",
    security(("bearerAuth" = [])),
    request_body = NewPost,
    responses(
        (status = 201, description = "Post published", body = Post),
        (status = 400, description = "Invalid post", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<NewPost>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let post = state.social().create_post(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[utoipa::path(
    get,
    path = "/api/social/posts/{id}",
    tag = "Posts",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Post identifier")),
    responses(
        (status = 200, description = "Post", body = Post),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
    headers: HeaderMap,
) -> Result<Json<Post>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let post = state.social().get_post(user.id, &post_id).await?;
    Ok(Json(post))
}

#[utoipa::path(
    delete,
    path = "/api/social/posts/{id}",
    tag = "Posts",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Post identifier")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 403, description = "Not the author", body = crate::error::ErrorResponse),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_post(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    state.social().delete_post(user.id, &post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/social/posts/{id}/reaction",
    tag = "Posts",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Post identifier")),
    request_body = ReactionRequest,
    responses(
        (status = 200, description = "Reaction toggled", body = ReactionOutcome),
        (status = 400, description = "Unknown reaction type", body = crate::error::ErrorResponse),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn toggle_reaction(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<ReactionRequest>,
) -> Result<Json<ReactionOutcome>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let outcome = state
        .social()
        .toggle_reaction(user.id, &post_id, &payload.reaction_type)
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/social/posts/{id}/bookmark",
    tag = "Posts",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Post identifier")),
    responses(
        (status = 200, description = "Bookmark toggled", body = BookmarkOutcome),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
    headers: HeaderMap,
) -> Result<Json<BookmarkOutcome>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    Ok(Json(state.social().toggle_bookmark(user.id, &post_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/social/posts/{id}/share",
    tag = "Posts",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Post identifier")),
    responses(
        (status = 200, description = "Share recorded", body = ShareOutcome),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn share_post(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
    headers: HeaderMap,
) -> Result<Json<ShareOutcome>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    Ok(Json(state.social().share_post(user.id, &post_id).await?))
}

/// Counts a view. Anonymous views are accepted.
#[utoipa::path(
    post,
    path = "/api/social/posts/{id}/view",
    tag = "Posts",
    params(("id" = String, Path, description = "Post identifier")),
    responses(
        (status = 200, description = "View recorded", body = ViewOutcome),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn record_view(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
    headers: HeaderMap,
) -> Result<Json<ViewOutcome>, ApiError> {
    let viewer = match state.current_user(&headers).await {
        Ok((user, _)) => Some(user.id),
        Err(_) => None,
    };
    let device = device_info(&headers, None);
    let outcome = state
        .social()
        .record_view(viewer, &post_id, device.ip_address.as_deref())
        .await?;
    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/api/social/posts/{id}/comments",
    tag = "Comments",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Post identifier"), PageQuery),
    responses(
        (status = 200, description = "Comments, oldest first", body = CommentPage),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Page<Comment>>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let page = state
        .social()
        .list_comments(user.id, &post_id, page_request(query.page, query.page_size))
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/api/social/posts/{id}/comments",
    tag = "Comments",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Post identifier")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 400, description = "Empty comment", body = crate::error::ErrorResponse),
        (status = 404, description = "Post or parent comment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_comment(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<String>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let comment = state
        .social()
        .create_comment(
            user.id,
            &post_id,
            &payload.content,
            payload.parent_id.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    post,
    path = "/api/social/comments/{id}/like",
    tag = "Comments",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Comment identifier")),
    responses(
        (status = 200, description = "Like toggled", body = CommentLikeOutcome),
        (status = 404, description = "Comment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn toggle_comment_like(
    State(state): State<AppState>,
    ApiPath(comment_id): ApiPath<String>,
    headers: HeaderMap,
) -> Result<Json<CommentLikeOutcome>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    Ok(Json(
        state
            .social()
            .toggle_comment_like(user.id, &comment_id)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/social/users/{id}/follow",
    tag = "Community",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "User public identifier")),
    responses(
        (status = 200, description = "Follow toggled", body = FollowOutcome),
        (status = 400, description = "Cannot follow yourself", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn toggle_follow(
    State(state): State<AppState>,
    ApiPath(target): ApiPath<String>,
    headers: HeaderMap,
) -> Result<Json<FollowOutcome>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    Ok(Json(state.social().toggle_follow(user.id, &target).await?))
}

#[utoipa::path(
    get,
    path = "/api/social/users/{id}/profile",
    tag = "Community",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "User public identifier")),
    responses(
        (status = 200, description = "Social profile", body = SocialProfile),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn social_profile(
    State(state): State<AppState>,
    ApiPath(target): ApiPath<String>,
    headers: HeaderMap,
) -> Result<Json<SocialProfile>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    Ok(Json(state.social().social_profile(user.id, &target).await?))
}

#[utoipa::path(
    get,
    path = "/api/social/users/suggested",
    tag = "Community",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "People to follow", body = [SuggestedUser]),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn suggested_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SuggestedUser>>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    Ok(Json(state.social().suggested_users(user.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/social/community/stats",
    tag = "Community",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Community totals", body = CommunityStats),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn community_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CommunityStats>, ApiError> {
    state.current_user(&headers).await?;
    Ok(Json(state.social().community_stats().await?))
}

#[utoipa::path(
    get,
    path = "/api/social/community/trending",
    tag = "Community",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Trending hashtags", body = [TrendingTopic]),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn trending_topics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<TrendingTopic>>, ApiError> {
    state.current_user(&headers).await?;
    Ok(Json(state.social().trending_topics().await?))
}

#[utoipa::path(
    get,
    path = "/api/social/discover",
    tag = "Community",
    security(("bearerAuth" = [])),
    params(DiscoverQuery),
    responses(
        (status = 200, description = "Matching posts", body = PostPage),
        (status = 400, description = "Unknown category", body = crate::error::ErrorResponse)
    )
)]
pub async fn discover(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<DiscoverQuery>,
) -> Result<Json<Page<Post>>, ApiError> {
    let (user, _) = state.current_user(&headers).await?;
    let category = category_filter(query.category.as_deref())?;
    let page = state
        .social()
        .discover(
            user.id,
            query.search.as_deref(),
            category,
            query.sort.unwrap_or_default(),
            page_request(query.page, query.page_size),
        )
        .await?;
    Ok(Json(page))
}
