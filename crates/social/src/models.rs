use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Fitness,
    Nutrition,
    Wellness,
    Routine,
    Motivation,
    Achievement,
    #[default]
    General,
}

impl PostType {
    pub const ALL: [PostType; 7] = [
        Self::Fitness,
        Self::Nutrition,
        Self::Wellness,
        Self::Routine,
        Self::Motivation,
        Self::Achievement,
        Self::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fitness => "fitness",
            Self::Nutrition => "nutrition",
            Self::Wellness => "wellness",
            Self::Routine => "routine",
            Self::Motivation => "motivation",
            Self::Achievement => "achievement",
            Self::General => "general",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Fitness => "Fitness",
            Self::Nutrition => "Nutrition",
            Self::Wellness => "Wellness",
            Self::Routine => "Routine",
            Self::Motivation => "Motivation",
            Self::Achievement => "Achievement",
            Self::General => "General",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReactionType {
    Liked,
    Loved,
    Motivated,
}

impl ReactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Liked => "liked",
            Self::Loved => "loved",
            Self::Motivated => "motivated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "liked" => Some(Self::Liked),
            "loved" => Some(Self::Loved),
            "motivated" => Some(Self::Motivated),
            _ => None,
        }
    }

    /// Counter column on `posts` tracking this reaction.
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::Liked => "likes_count",
            Self::Loved => "loves_count",
            Self::Motivated => "motivates_count",
        }
    }

    pub(crate) fn notification(&self) -> NotificationType {
        match self {
            Self::Liked => NotificationType::Like,
            Self::Loved => NotificationType::Love,
            Self::Motivated => NotificationType::Motivate,
        }
    }

    pub(crate) fn verb(&self) -> &'static str {
        match self {
            Self::Liked => "liked",
            Self::Loved => "loved",
            Self::Motivated => "was motivated by",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Like,
    Love,
    Motivate,
    Comment,
    Follow,
    Message,
    Mention,
    Post,
    Share,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Love => "love",
            Self::Motivate => "motivate",
            Self::Comment => "comment",
            Self::Follow => "follow",
            Self::Message => "message",
            Self::Mention => "mention",
            Self::Post => "post",
            Self::Share => "share",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "like" => Self::Like,
            "love" => Self::Love,
            "motivate" => Self::Motivate,
            "comment" => Self::Comment,
            "follow" => Self::Follow,
            "message" => Self::Message,
            "mention" => Self::Mention,
            "post" => Self::Post,
            "share" => Self::Share,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeedSort {
    #[default]
    Recent,
    Trending,
    Popular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverSort {
    #[default]
    Trending,
    Popular,
    Discussed,
    Recent,
}

/// Public face of a user inside social payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BasicUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: String,
    pub verified: bool,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Media {
    pub media_type: MediaType,
    pub file_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewPost {
    #[serde(rename = "type", default)]
    pub post_type: PostType,
    pub content: String,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metrics: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ViewerReactions {
    pub liked: bool,
    pub loved: bool,
    pub motivated: bool,
}

impl ViewerReactions {
    pub(crate) fn from_reaction(reaction: Option<ReactionType>) -> Self {
        Self {
            liked: reaction == Some(ReactionType::Liked),
            loved: reaction == Some(ReactionType::Loved),
            motivated: reaction == Some(ReactionType::Motivated),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Post {
    pub id: String,
    pub user: BasicUser,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub timestamp: String,
    pub likes_count: i64,
    pub loves_count: i64,
    pub motivates_count: i64,
    pub comments_count: i64,
    pub shares_count: i64,
    pub bookmarks_count: i64,
    pub views_count: i64,
    pub engagement_score: f64,
    pub media: Vec<Media>,
    #[schema(value_type = Object)]
    pub metrics: serde_json::Value,
    pub tags: Vec<String>,
    pub reactions: ViewerReactions,
    pub bookmarked: bool,
    pub comments_preview: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    pub id: String,
    pub user: BasicUser,
    pub content: String,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub likes_count: i64,
    pub replies: Vec<Comment>,
    pub user_liked: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReactionCounts {
    pub likes: i64,
    pub loves: i64,
    pub motivates: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReactionOutcome {
    pub message: String,
    pub reaction_type: Option<ReactionType>,
    pub counts: ReactionCounts,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct BookmarkOutcome {
    pub bookmarked: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct ShareOutcome {
    pub shares_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct ViewOutcome {
    pub views_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct CommentLikeOutcome {
    pub liked: bool,
    pub likes_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FollowOutcome {
    pub message: String,
    pub following: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SocialProfile {
    pub user: BasicUser,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub is_verified: bool,
    pub wellness_goals: Vec<String>,
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
    pub is_following: bool,
    pub is_followed_by: bool,
    pub mutual_connections: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuggestedUser {
    pub user: BasicUser,
    pub followers_count: i64,
    pub mutual_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CommunityStats {
    pub total_posts: i64,
    pub total_users: i64,
    pub posts_today: i64,
    pub engagement_rate: f64,
    pub trending_category: String,
    pub weekly_growth: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrendingTopic {
    pub name: String,
    pub posts_count: i64,
    pub growth: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
    pub from_user: Option<BasicUser>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct UnreadCount {
    pub unread_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct MarkedRead {
    pub updated: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_type_parses_case_insensitively() {
        assert_eq!(PostType::parse("Fitness"), Some(PostType::Fitness));
        assert_eq!(PostType::parse(" routine "), Some(PostType::Routine));
        assert_eq!(PostType::parse("gaming"), None);
    }

    #[test]
    fn viewer_reactions_mark_only_the_active_type() {
        let reactions = ViewerReactions::from_reaction(Some(ReactionType::Loved));
        assert!(!reactions.liked);
        assert!(reactions.loved);
        assert!(!reactions.motivated);
        assert_eq!(ViewerReactions::from_reaction(None), ViewerReactions::default());
    }

    #[test]
    fn new_post_reads_type_field() {
        let post: NewPost =
            serde_json::from_str(r#"{"type": "nutrition", "content": "oats"}"#).unwrap();
        assert_eq!(post.post_type, PostType::Nutrition);
        assert!(post.hashtags.is_empty());
    }
}
