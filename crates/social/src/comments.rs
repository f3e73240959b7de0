use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::info;
use wellzo_database::{format_timestamp, WriteTransaction};

use crate::error::SocialError;
use crate::models::{Comment, CommentLikeOutcome, NotificationType};
use crate::pagination::{Page, PageRequest};
use crate::support::{
    basic_user_from_row, bump_post_counter, display_name, insert_notification, load_basic_user,
    post_header, refresh_score, NewNotification, USER_JOIN, USER_SELECT,
};
use crate::SocialService;

const REPLIES_SHOWN: i64 = 3;

fn comment_select() -> String {
    format!(
        "SELECT t.id, t.post_id, t.parent_id, t.content, t.likes_count, t.created_at, \
         t.updated_at, {USER_SELECT}, \
         EXISTS(SELECT 1 FROM comment_likes cl WHERE cl.comment_id = t.id AND cl.user_id = ?) \
         AS user_liked \
         FROM comments t {USER_JOIN}"
    )
}

fn comment_from_row(row: &SqliteRow, replies: Vec<Comment>) -> Result<Comment, sqlx::Error> {
    Ok(Comment {
        id: row.try_get("id")?,
        user: basic_user_from_row(row)?,
        content: row.try_get("content")?,
        parent_id: row.try_get("parent_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        likes_count: row.try_get("likes_count")?,
        replies,
        user_liked: row.try_get("user_liked")?,
    })
}

/// Top-level comments of a post, oldest first, each with its first replies.
pub(crate) async fn top_level_comments(
    conn: &mut SqliteConnection,
    post_id: &str,
    viewer: Option<i64>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Comment>, SocialError> {
    let rows = sqlx::query(&format!(
        "{} WHERE t.post_id = ? AND t.parent_id IS NULL \
         ORDER BY t.created_at ASC, t.rowid ASC LIMIT ? OFFSET ?",
        comment_select()
    ))
    .bind(viewer)
    .bind(post_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *conn)
    .await?;

    let mut comments = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: String = row.try_get("id")?;
        let reply_rows = sqlx::query(&format!(
            "{} WHERE t.parent_id = ? ORDER BY t.created_at ASC, t.rowid ASC LIMIT ?",
            comment_select()
        ))
        .bind(viewer)
        .bind(&id)
        .bind(REPLIES_SHOWN)
        .fetch_all(&mut *conn)
        .await?;

        let replies = reply_rows
            .iter()
            .map(|reply| comment_from_row(reply, Vec::new()))
            .collect::<Result<Vec<_>, _>>()?;
        comments.push(comment_from_row(row, replies)?);
    }
    Ok(comments)
}

impl SocialService {
    pub async fn list_comments(
        &self,
        viewer: i64,
        post_id: &str,
        page: PageRequest,
    ) -> Result<Page<Comment>, SocialError> {
        let mut conn = self.pool.acquire().await?;
        let header = post_header(&mut conn, post_id).await?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE post_id = ? AND parent_id IS NULL",
        )
        .bind(&header.id)
        .fetch_one(&mut *conn)
        .await?;

        let comments =
            top_level_comments(&mut conn, &header.id, Some(viewer), page.limit(), page.offset())
                .await?;
        Ok(Page::new(&page, count, comments))
    }

    /// Comment on a post, or reply to one of its comments.
    pub async fn create_comment(
        &self,
        author: i64,
        post_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment, SocialError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SocialError::validation("Comment content cannot be empty"));
        }

        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let header = post_header(&mut tx, post_id).await?;

        if let Some(parent_id) = parent_id {
            let parent_post: Option<String> =
                sqlx::query_scalar("SELECT post_id FROM comments WHERE id = ?")
                    .bind(parent_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if parent_post.as_deref() != Some(header.id.as_str()) {
                return Err(SocialError::NotFound("Parent comment"));
            }
        }

        let comment_id = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());
        sqlx::query(
            "INSERT INTO comments (id, post_id, user_id, parent_id, content, likes_count, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&comment_id)
        .bind(&header.id)
        .bind(author)
        .bind(parent_id)
        .bind(content)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        bump_post_counter(&mut tx, &header.id, "comments_count", 1).await?;
        refresh_score(&mut tx, &header.id).await?;

        if header.owner_id != author {
            let commenter = load_basic_user(&mut tx, author).await?;
            let name = display_name(&commenter).to_string();
            insert_notification(
                &mut tx,
                NewNotification {
                    recipient: header.owner_id,
                    kind: NotificationType::Comment,
                    title: "New comment on your post".to_string(),
                    message: format!("{name} commented on your {} post", header.post_type),
                    post_id: Some(&header.id),
                    comment_id: Some(&comment_id),
                    from_user: Some(author),
                },
            )
            .await?;
        }

        let row = sqlx::query(&format!("{} WHERE t.id = ?", comment_select()))
            .bind(author)
            .bind(&comment_id)
            .fetch_one(&mut *tx)
            .await?;
        let comment = comment_from_row(&row, Vec::new())?;

        tx.commit().await?;
        info!(comment_id = %comment.id, post_id, author, "comment created");
        Ok(comment)
    }

    pub async fn toggle_comment_like(
        &self,
        user_id: i64,
        comment_id: &str,
    ) -> Result<CommentLikeOutcome, SocialError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM comments WHERE id = ?)")
            .bind(comment_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(SocialError::NotFound("Comment"));
        }

        let removed = sqlx::query("DELETE FROM comment_likes WHERE user_id = ? AND comment_id = ?")
            .bind(user_id)
            .bind(comment_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let liked = removed == 0;
        if liked {
            sqlx::query(
                "INSERT INTO comment_likes (user_id, comment_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(comment_id)
            .bind(format_timestamp(Utc::now()))
            .execute(&mut *tx)
            .await?;
        }

        let delta: i64 = if liked { 1 } else { -1 };
        sqlx::query("UPDATE comments SET likes_count = MAX(likes_count + ?, 0) WHERE id = ?")
            .bind(delta)
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;

        let likes_count: i64 = sqlx::query_scalar("SELECT likes_count FROM comments WHERE id = ?")
            .bind(comment_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(CommentLikeOutcome { liked, likes_count })
    }
}
