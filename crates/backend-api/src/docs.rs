use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::auth::register,
        crate::routes::auth::verify_otp,
        crate::routes::auth::resend_otp,
        crate::routes::auth::login,
        crate::routes::auth::google_login,
        crate::routes::auth::google_authorize,
        crate::routes::auth::google_callback,
        crate::routes::auth::refresh_token,
        crate::routes::auth::request_password_reset,
        crate::routes::auth::confirm_password_reset,
        crate::routes::auth::extend_session,
        crate::routes::auth::logout,
        crate::routes::auth::list_sessions,
        crate::routes::auth::delete_account,
        crate::routes::profile::get_profile,
        crate::routes::profile::update_profile,
        crate::routes::profile::delete_profile,
        crate::routes::social::list_posts,
        crate::routes::social::create_post,
        crate::routes::social::get_post,
        crate::routes::social::delete_post,
        crate::routes::social::toggle_reaction,
        crate::routes::social::toggle_bookmark,
        crate::routes::social::share_post,
        crate::routes::social::record_view,
        crate::routes::social::list_comments,
        crate::routes::social::create_comment,
        crate::routes::social::toggle_comment_like,
        crate::routes::social::toggle_follow,
        crate::routes::social::social_profile,
        crate::routes::social::suggested_users,
        crate::routes::social::community_stats,
        crate::routes::social::trending_topics,
        crate::routes::social::discover,
        crate::routes::notifications::list_notifications,
        crate::routes::notifications::unread_count,
        crate::routes::notifications::mark_all_read,
        crate::routes::wearables::list_readings,
        crate::routes::wearables::create_reading,
        crate::routes::wearables::get_reading,
        crate::routes::wearables::update_reading,
        crate::routes::wearables::delete_reading,
        crate::routes::wearables::scan_devices,
        crate::routes::wearables::collect_reading,
        crate::routes::wearables::connect_device
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::routes::MessageResponse,
            crate::routes::health::HealthResponse,
            crate::routes::auth::RegisterResponse,
            crate::routes::auth::VerifyOtpRequest,
            crate::routes::auth::EmailRequest,
            crate::routes::auth::LoginRequest,
            crate::routes::auth::GoogleLoginRequest,
            crate::routes::auth::GoogleAuthorizeResponse,
            crate::routes::auth::GoogleCallbackRequest,
            crate::routes::auth::RefreshRequest,
            crate::routes::auth::ConfirmPasswordResetRequest,
            crate::routes::auth::ExtendSessionResponse,
            crate::routes::auth::SessionsResponse,
            crate::routes::auth::DeleteAccountRequest,
            crate::routes::social::PostPage,
            crate::routes::social::CommentPage,
            crate::routes::social::ReactionRequest,
            crate::routes::social::CommentRequest,
            crate::routes::notifications::NotificationPage,
            crate::routes::wearables::ReadingPage,
            crate::routes::wearables::CollectRequest,
            crate::routes::wearables::ConnectRequest,
            wellzo_auth::User,
            wellzo_auth::UserRole,
            wellzo_auth::UserSession,
            wellzo_auth::UserProfile,
            wellzo_auth::ProfileUpdate,
            wellzo_auth::Registration,
            wellzo_auth::TokenPair,
            wellzo_auth::AuthOutcome,
            wellzo_social::PostType,
            wellzo_social::ReactionType,
            wellzo_social::NotificationType,
            wellzo_social::FeedSort,
            wellzo_social::DiscoverSort,
            wellzo_social::BasicUser,
            wellzo_social::MediaType,
            wellzo_social::Media,
            wellzo_social::NewPost,
            wellzo_social::ViewerReactions,
            wellzo_social::Post,
            wellzo_social::Comment,
            wellzo_social::ReactionCounts,
            wellzo_social::ReactionOutcome,
            wellzo_social::BookmarkOutcome,
            wellzo_social::ShareOutcome,
            wellzo_social::ViewOutcome,
            wellzo_social::CommentLikeOutcome,
            wellzo_social::FollowOutcome,
            wellzo_social::SocialProfile,
            wellzo_social::SuggestedUser,
            wellzo_social::CommunityStats,
            wellzo_social::TrendingTopic,
            wellzo_social::Notification,
            wellzo_social::UnreadCount,
            wellzo_social::MarkedRead,
            wellzo_wearables::WearableData,
            wellzo_wearables::NewReading,
            wellzo_wearables::ReadingUpdate,
            wellzo_wearables::DiscoveredDevice,
            wellzo_wearables::ConnectedDevice
        )
    ),
    tags(
        (name = "Health", description = "Service health endpoints"),
        (name = "Auth", description = "Registration, sign-in and session management"),
        (name = "Profile", description = "Wellness profile of the caller"),
        (name = "Posts", description = "Feed, posts and their engagement"),
        (name = "Comments", description = "Threaded comments and comment likes"),
        (name = "Community", description = "Follows, discovery and community aggregates"),
        (name = "Notifications", description = "User notifications"),
        (name = "Wearables", description = "Wearable readings and BLE devices")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let schemes = &mut components.security_schemes;

        let mut scheme = SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer));
        if let SecurityScheme::Http(http) = &mut scheme {
            http.bearer_format = Some("JWT".to_string());
        }

        schemes.insert("bearerAuth".to_string(), scheme);
    }
}
