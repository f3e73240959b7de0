use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info};
use wellzo_database::{format_timestamp, WriteTransaction};

use crate::cache::user_activity_key;
use crate::comments::top_level_comments;
use crate::error::SocialError;
use crate::hashtags::{self, extract_hashtags};
use crate::models::{
    FeedSort, Media, MediaType, NewPost, NotificationType, Post, PostType, ReactionType,
    ViewOutcome, ViewerReactions,
};
use crate::pagination::{Page, PageRequest};
use crate::support::{
    basic_user_from_row, bump_post_counter, bump_profile_counter, display_name,
    insert_notification, load_basic_user, post_header, refresh_score, NewNotification,
    USER_JOIN, USER_SELECT,
};
use crate::SocialService;

const COMMENTS_PREVIEW: i64 = 2;

pub(crate) fn post_select() -> String {
    format!(
        "SELECT t.id, t.user_id, t.post_type, t.content, t.likes_count, t.loves_count, \
         t.motivates_count, t.comments_count, t.shares_count, t.bookmarks_count, t.views_count, \
         t.engagement_score, t.created_at, {USER_SELECT} FROM posts t {USER_JOIN}"
    )
}

impl SocialService {
    /// The feed, optionally narrowed to one post type.
    pub async fn list_posts(
        &self,
        viewer: i64,
        post_type: Option<PostType>,
        sort: FeedSort,
        page: PageRequest,
    ) -> Result<Page<Post>, SocialError> {
        self.cache
            .set_json(
                &user_activity_key(viewer),
                &format_timestamp(Utc::now()),
                self.ttls.user_activity,
            )
            .await;

        let order = match sort {
            FeedSort::Recent => "t.created_at DESC",
            FeedSort::Trending => "t.engagement_score DESC, t.created_at DESC",
            FeedSort::Popular => {
                "(t.likes_count + t.loves_count + t.motivates_count) DESC, t.created_at DESC"
            }
        };

        let mut conn = self.pool.acquire().await?;
        let type_filter = post_type.map(|kind| kind.as_str());

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE (? IS NULL OR post_type = ?)")
                .bind(type_filter)
                .bind(type_filter)
                .fetch_one(&mut *conn)
                .await?;

        let rows = sqlx::query(&format!(
            "{} WHERE (? IS NULL OR t.post_type = ?) ORDER BY {order} LIMIT ? OFFSET ?",
            post_select()
        ))
        .bind(type_filter)
        .bind(type_filter)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in &rows {
            posts.push(hydrate_post(&mut conn, row, Some(viewer)).await?);
        }

        Ok(Page::new(&page, count, posts))
    }

    pub async fn create_post(&self, author: i64, new_post: NewPost) -> Result<Post, SocialError> {
        let content = new_post.content.trim();
        if content.is_empty() {
            return Err(SocialError::validation("Post content cannot be empty"));
        }
        if let Some(metrics) = &new_post.metrics {
            if !metrics.is_object() {
                return Err(SocialError::validation("Post metrics must be a JSON object"));
            }
        }

        let post_id = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());
        let tags = extract_hashtags(content, &new_post.hashtags);

        let mut tx = WriteTransaction::begin(&self.pool).await?;

        let author_user = load_basic_user(&mut tx, author).await?;

        sqlx::query(
            "INSERT INTO posts (id, user_id, post_type, content, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&post_id)
        .bind(author)
        .bind(new_post.post_type.as_str())
        .bind(content)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for (position, media) in new_post.media.iter().enumerate() {
            sqlx::query(
                "INSERT INTO post_media (post_id, media_type, file_url, thumbnail_url, position) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&post_id)
            .bind(media.media_type.as_str())
            .bind(&media.file_url)
            .bind(media.thumbnail_url.as_deref())
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(metrics) = &new_post.metrics {
            sqlx::query("INSERT INTO post_metrics (post_id, data) VALUES (?, ?)")
                .bind(&post_id)
                .bind(serde_json::to_string(metrics)?)
                .execute(&mut *tx)
                .await?;
        }

        hashtags::attach(&mut tx, &post_id, &tags).await?;
        bump_profile_counter(&mut tx, author, "posts_count", 1).await?;

        let followers: Vec<i64> =
            sqlx::query_scalar("SELECT follower_id FROM follows WHERE following_id = ?")
                .bind(author)
                .fetch_all(&mut *tx)
                .await?;

        let name = display_name(&author_user).to_string();
        for follower in &followers {
            insert_notification(
                &mut tx,
                NewNotification {
                    recipient: *follower,
                    kind: NotificationType::Post,
                    title: format!("New post from {name}"),
                    message: format!(
                        "{name} shared a new {} post",
                        new_post.post_type.as_str()
                    ),
                    post_id: Some(&post_id),
                    comment_id: None,
                    from_user: Some(author),
                },
            )
            .await?;
        }

        tx.commit().await?;
        info!(
            post_id = %post_id,
            author,
            tags = tags.len(),
            notified = followers.len(),
            "post created"
        );

        self.get_post(author, &post_id).await
    }

    pub async fn get_post(&self, viewer: i64, post_id: &str) -> Result<Post, SocialError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!("{} WHERE t.id = ?", post_select()))
            .bind(post_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(SocialError::NotFound("Post"))?;

        hydrate_post(&mut conn, &row, Some(viewer)).await
    }

    /// Only the author may delete a post.
    pub async fn delete_post(&self, user_id: i64, post_id: &str) -> Result<(), SocialError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let header = post_header(&mut tx, post_id).await?;
        if header.owner_id != user_id {
            return Err(SocialError::forbidden("You can only delete your own posts"));
        }

        hashtags::detach(&mut tx, &header.id).await?;
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(&header.id)
            .execute(&mut *tx)
            .await?;
        bump_profile_counter(&mut tx, user_id, "posts_count", -1).await?;
        tx.commit().await?;

        info!(post_id, user_id, "post deleted");
        Ok(())
    }

    pub async fn record_view(
        &self,
        viewer: Option<i64>,
        post_id: &str,
        ip_address: Option<&str>,
    ) -> Result<ViewOutcome, SocialError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let header = post_header(&mut tx, post_id).await?;

        sqlx::query("INSERT INTO post_views (user_id, post_id, ip_address, viewed_at) VALUES (?, ?, ?, ?)")
            .bind(viewer)
            .bind(&header.id)
            .bind(ip_address)
            .bind(format_timestamp(Utc::now()))
            .execute(&mut *tx)
            .await?;
        bump_post_counter(&mut tx, &header.id, "views_count", 1).await?;
        refresh_score(&mut tx, &header.id).await?;

        let views_count: i64 = sqlx::query_scalar("SELECT views_count FROM posts WHERE id = ?")
            .bind(&header.id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(post_id, views_count, "post viewed");
        Ok(ViewOutcome { views_count })
    }

    /// Recompute stored engagement scores, skipping posts that are gone.
    pub async fn refresh_engagement(&self, post_ids: &[String]) -> Result<(), SocialError> {
        if post_ids.is_empty() {
            return Ok(());
        }
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        for post_id in post_ids {
            match refresh_score(&mut tx, post_id).await {
                Ok(_) | Err(SocialError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        tx.commit().await?;
        debug!(posts = post_ids.len(), "engagement scores refreshed");
        Ok(())
    }
}

/// Build the full post payload, including what the viewer did with it.
pub(crate) async fn hydrate_post(
    conn: &mut SqliteConnection,
    row: &SqliteRow,
    viewer: Option<i64>,
) -> Result<Post, SocialError> {
    let id: String = row.try_get("id")?;
    let post_type: String = row.try_get("post_type")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    let media_rows = sqlx::query(
        "SELECT media_type, file_url, thumbnail_url FROM post_media WHERE post_id = ? ORDER BY position",
    )
    .bind(&id)
    .fetch_all(&mut *conn)
    .await?;
    let mut media = Vec::with_capacity(media_rows.len());
    for media_row in &media_rows {
        let kind: String = media_row.try_get("media_type")?;
        media.push(Media {
            media_type: if kind == "video" {
                MediaType::Video
            } else {
                MediaType::Image
            },
            file_url: media_row.try_get("file_url")?,
            thumbnail_url: media_row.try_get("thumbnail_url")?,
        });
    }

    let metrics: Option<String> = sqlx::query_scalar("SELECT data FROM post_metrics WHERE post_id = ?")
        .bind(&id)
        .fetch_optional(&mut *conn)
        .await?;
    let metrics = match metrics {
        Some(data) => serde_json::from_str(&data)?,
        None => serde_json::Value::Null,
    };

    let tags = hashtags::tags_for(conn, &id).await?;

    let (reactions, bookmarked) = match viewer {
        Some(viewer) => {
            let reaction: Option<String> = sqlx::query_scalar(
                "SELECT reaction_type FROM reactions WHERE user_id = ? AND post_id = ?",
            )
            .bind(viewer)
            .bind(&id)
            .fetch_optional(&mut *conn)
            .await?;
            let bookmarked: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM bookmarks WHERE user_id = ? AND post_id = ?)",
            )
            .bind(viewer)
            .bind(&id)
            .fetch_one(&mut *conn)
            .await?;
            (
                ViewerReactions::from_reaction(reaction.as_deref().and_then(ReactionType::parse)),
                bookmarked,
            )
        }
        None => (ViewerReactions::default(), false),
    };

    let comments_preview = top_level_comments(conn, &id, viewer, COMMENTS_PREVIEW, 0).await?;

    Ok(Post {
        user: basic_user_from_row(row)?,
        post_type: PostType::parse(&post_type).unwrap_or_default(),
        content: row.try_get("content")?,
        timestamp: crate::humanize_since(created_at, Utc::now()),
        created_at,
        likes_count: row.try_get("likes_count")?,
        loves_count: row.try_get("loves_count")?,
        motivates_count: row.try_get("motivates_count")?,
        comments_count: row.try_get("comments_count")?,
        shares_count: row.try_get("shares_count")?,
        bookmarks_count: row.try_get("bookmarks_count")?,
        views_count: row.try_get("views_count")?,
        engagement_score: row.try_get("engagement_score")?,
        media,
        metrics,
        tags,
        reactions,
        bookmarked,
        comments_preview,
        id,
    })
}
