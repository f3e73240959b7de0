use chrono::Utc;
use sqlx::{Row, SqliteConnection};
use tracing::debug;
use wellzo_database::{format_timestamp, WriteTransaction};

use crate::error::SocialError;
use crate::models::{
    BookmarkOutcome, NotificationType, ReactionCounts, ReactionOutcome, ReactionType,
    ShareOutcome,
};
use crate::support::{
    bump_post_counter, display_name, insert_notification, load_basic_user, post_header,
    refresh_score, NewNotification, PostHeader,
};
use crate::SocialService;

async fn reaction_counts(
    conn: &mut SqliteConnection,
    post_id: &str,
) -> Result<ReactionCounts, SocialError> {
    let row = sqlx::query("SELECT likes_count, loves_count, motivates_count FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(ReactionCounts {
        likes: row.try_get("likes_count")?,
        loves: row.try_get("loves_count")?,
        motivates: row.try_get("motivates_count")?,
    })
}

async fn notify_owner(
    conn: &mut SqliteConnection,
    header: &PostHeader,
    actor: i64,
    kind: NotificationType,
    title: String,
    message: impl FnOnce(&str) -> String,
) -> Result<(), SocialError> {
    if header.owner_id == actor {
        return Ok(());
    }
    let actor_user = load_basic_user(conn, actor).await?;
    let message = message(display_name(&actor_user));
    insert_notification(
        conn,
        NewNotification {
            recipient: header.owner_id,
            kind,
            title,
            message,
            post_id: Some(&header.id),
            comment_id: None,
            from_user: Some(actor),
        },
    )
    .await?;
    Ok(())
}

impl SocialService {
    /// React to a post. Repeating the current reaction removes it, a
    /// different one replaces it.
    pub async fn toggle_reaction(
        &self,
        user_id: i64,
        post_id: &str,
        reaction: &str,
    ) -> Result<ReactionOutcome, SocialError> {
        let reaction = ReactionType::parse(reaction).ok_or_else(|| {
            SocialError::validation("Invalid reaction type. Use liked, loved or motivated")
        })?;

        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let header = post_header(&mut tx, post_id).await?;

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT reaction_type FROM reactions WHERE user_id = ? AND post_id = ?",
        )
        .bind(user_id)
        .bind(&header.id)
        .fetch_optional(&mut *tx)
        .await?;
        let existing = existing.as_deref().and_then(ReactionType::parse);

        let (message, current) = match existing {
            Some(previous) if previous == reaction => {
                sqlx::query("DELETE FROM reactions WHERE user_id = ? AND post_id = ?")
                    .bind(user_id)
                    .bind(&header.id)
                    .execute(&mut *tx)
                    .await?;
                bump_post_counter(&mut tx, &header.id, reaction.column(), -1).await?;
                ("Reaction removed", None)
            }
            Some(previous) => {
                sqlx::query(
                    "UPDATE reactions SET reaction_type = ?, created_at = ? \
                     WHERE user_id = ? AND post_id = ?",
                )
                .bind(reaction.as_str())
                .bind(format_timestamp(Utc::now()))
                .bind(user_id)
                .bind(&header.id)
                .execute(&mut *tx)
                .await?;
                bump_post_counter(&mut tx, &header.id, previous.column(), -1).await?;
                bump_post_counter(&mut tx, &header.id, reaction.column(), 1).await?;
                ("Reaction updated", Some(reaction))
            }
            None => {
                sqlx::query(
                    "INSERT INTO reactions (user_id, post_id, reaction_type, created_at) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(user_id)
                .bind(&header.id)
                .bind(reaction.as_str())
                .bind(format_timestamp(Utc::now()))
                .execute(&mut *tx)
                .await?;
                bump_post_counter(&mut tx, &header.id, reaction.column(), 1).await?;
                ("Reaction updated", Some(reaction))
            }
        };

        refresh_score(&mut tx, &header.id).await?;

        if current.is_some() {
            notify_owner(
                &mut tx,
                &header,
                user_id,
                reaction.notification(),
                "New reaction on your post".to_string(),
                |name| format!("{name} {} your {} post", reaction.verb(), header.post_type),
            )
            .await?;
        }

        let counts = reaction_counts(&mut tx, &header.id).await?;
        tx.commit().await?;

        debug!(post_id, user_id, reaction = ?current, "reaction toggled");
        Ok(ReactionOutcome {
            message: message.to_string(),
            reaction_type: current,
            counts,
        })
    }

    pub async fn toggle_bookmark(
        &self,
        user_id: i64,
        post_id: &str,
    ) -> Result<BookmarkOutcome, SocialError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let header = post_header(&mut tx, post_id).await?;

        let removed = sqlx::query("DELETE FROM bookmarks WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(&header.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let bookmarked = removed == 0;
        if bookmarked {
            sqlx::query("INSERT INTO bookmarks (user_id, post_id, created_at) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(&header.id)
                .bind(format_timestamp(Utc::now()))
                .execute(&mut *tx)
                .await?;
        }
        bump_post_counter(
            &mut tx,
            &header.id,
            "bookmarks_count",
            if bookmarked { 1 } else { -1 },
        )
        .await?;

        tx.commit().await?;
        Ok(BookmarkOutcome { bookmarked })
    }

    pub async fn share_post(&self, user_id: i64, post_id: &str) -> Result<ShareOutcome, SocialError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let header = post_header(&mut tx, post_id).await?;

        sqlx::query("INSERT INTO shares (user_id, post_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(&header.id)
            .bind(format_timestamp(Utc::now()))
            .execute(&mut *tx)
            .await?;
        bump_post_counter(&mut tx, &header.id, "shares_count", 1).await?;
        refresh_score(&mut tx, &header.id).await?;

        notify_owner(
            &mut tx,
            &header,
            user_id,
            NotificationType::Share,
            "Your post was shared!".to_string(),
            |name| format!("{name} shared your {} post", header.post_type),
        )
        .await?;

        let shares_count: i64 = sqlx::query_scalar("SELECT shares_count FROM posts WHERE id = ?")
            .bind(&header.id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(ShareOutcome { shares_count })
    }
}
