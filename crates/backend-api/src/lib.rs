mod docs;
mod error;
mod state;
mod util;

pub mod routes;

pub use docs::ApiDoc;
pub use error::{ApiError, ErrorResponse};
pub use state::{AppState, OAuthStateStore};

use axum::{
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        // Auth routes
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/verify-otp", post(routes::auth::verify_otp))
        .route("/api/auth/resend-otp", post(routes::auth::resend_otp))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/google", post(routes::auth::google_login))
        .route(
            "/api/auth/google/authorize",
            get(routes::auth::google_authorize),
        )
        .route(
            "/api/auth/google/callback",
            post(routes::auth::google_callback),
        )
        .route("/api/auth/token/refresh", post(routes::auth::refresh_token))
        .route(
            "/api/auth/password-reset/request",
            post(routes::auth::request_password_reset),
        )
        .route(
            "/api/auth/password-reset/confirm",
            post(routes::auth::confirm_password_reset),
        )
        .route(
            "/api/auth/session/extend",
            post(routes::auth::extend_session),
        )
        .route("/api/auth/logout", post(routes::auth::logout))
        .route("/api/auth/sessions", get(routes::auth::list_sessions))
        .route(
            "/api/auth/account",
            delete(routes::auth::delete_account),
        )
        .route(
            "/api/profile",
            get(routes::profile::get_profile)
                .put(routes::profile::update_profile)
                .delete(routes::profile::delete_profile),
        )
        // Social routes
        .route(
            "/api/social/posts",
            get(routes::social::list_posts).post(routes::social::create_post),
        )
        .route(
            "/api/social/posts/:id",
            get(routes::social::get_post).delete(routes::social::delete_post),
        )
        .route(
            "/api/social/posts/:id/reaction",
            post(routes::social::toggle_reaction),
        )
        .route(
            "/api/social/posts/:id/bookmark",
            post(routes::social::toggle_bookmark),
        )
        .route(
            "/api/social/posts/:id/share",
            post(routes::social::share_post),
        )
        .route(
            "/api/social/posts/:id/view",
            post(routes::social::record_view),
        )
        .route(
            "/api/social/posts/:id/comments",
            get(routes::social::list_comments).post(routes::social::create_comment),
        )
        .route(
            "/api/social/comments/:id/like",
            post(routes::social::toggle_comment_like),
        )
        .route(
            "/api/social/users/suggested",
            get(routes::social::suggested_users),
        )
        .route(
            "/api/social/users/:id/follow",
            post(routes::social::toggle_follow),
        )
        .route(
            "/api/social/users/:id/profile",
            get(routes::social::social_profile),
        )
        .route(
            "/api/social/community/stats",
            get(routes::social::community_stats),
        )
        .route(
            "/api/social/community/trending",
            get(routes::social::trending_topics),
        )
        .route("/api/social/discover", get(routes::social::discover))
        // Notification routes
        .route(
            "/api/social/notifications",
            get(routes::notifications::list_notifications),
        )
        .route(
            "/api/social/notifications/unread-count",
            get(routes::notifications::unread_count),
        )
        .route(
            "/api/social/notifications/read-all",
            post(routes::notifications::mark_all_read),
        )
        // Wearable routes
        .route(
            "/api/wearables",
            get(routes::wearables::list_readings).post(routes::wearables::create_reading),
        )
        .route("/api/wearables/scan", get(routes::wearables::scan_devices))
        .route(
            "/api/wearables/collect",
            post(routes::wearables::collect_reading),
        )
        .route(
            "/api/wearables/connect",
            post(routes::wearables::connect_device),
        )
        .route(
            "/api/wearables/:id",
            get(routes::wearables::get_reading)
                .patch(routes::wearables::update_reading)
                .delete(routes::wearables::delete_reading),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
