use chrono::Utc;
use sqlx::Row;
use tracing::info;
use wellzo_database::{format_timestamp, WriteTransaction};

use crate::error::SocialError;
use crate::models::{FollowOutcome, NotificationType, SocialProfile, SuggestedUser};
use crate::support::{
    basic_user_from_row, bump_profile_counter, display_name, ensure_social_profile,
    insert_notification, load_basic_user, user_id_for, NewNotification, USER_SELECT,
};
use crate::SocialService;

const SUGGESTIONS: i64 = 10;

impl SocialService {
    /// Follow or unfollow `target`, keeping both profile counters in step.
    pub async fn toggle_follow(
        &self,
        user_id: i64,
        target: &str,
    ) -> Result<FollowOutcome, SocialError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let target_id = user_id_for(&mut tx, target).await?;
        if target_id == user_id {
            return Err(SocialError::validation("You cannot follow yourself"));
        }

        let removed = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND following_id = ?")
            .bind(user_id)
            .bind(target_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let following = removed == 0;
        let delta = if following { 1 } else { -1 };

        if following {
            sqlx::query(
                "INSERT INTO follows (follower_id, following_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(target_id)
            .bind(format_timestamp(Utc::now()))
            .execute(&mut *tx)
            .await?;
        }

        bump_profile_counter(&mut tx, user_id, "following_count", delta).await?;
        bump_profile_counter(&mut tx, target_id, "followers_count", delta).await?;

        let follower = load_basic_user(&mut tx, user_id).await?;
        let target_user = load_basic_user(&mut tx, target_id).await?;

        if following {
            insert_notification(
                &mut tx,
                NewNotification {
                    recipient: target_id,
                    kind: NotificationType::Follow,
                    title: "New follower!".to_string(),
                    message: format!("{} started following you", display_name(&follower)),
                    post_id: None,
                    comment_id: None,
                    from_user: Some(user_id),
                },
            )
            .await?;
        }

        tx.commit().await?;
        info!(user_id, target_id, following, "follow toggled");

        let message = if following {
            format!("You are now following {}", target_user.name)
        } else {
            format!("You unfollowed {}", target_user.name)
        };
        Ok(FollowOutcome { message, following })
    }

    pub async fn social_profile(
        &self,
        viewer: i64,
        target: &str,
    ) -> Result<SocialProfile, SocialError> {
        let mut conn = self.pool.acquire().await?;
        let target_id = user_id_for(&mut conn, target).await?;
        ensure_social_profile(&mut conn, target_id).await?;

        let row = sqlx::query(
            "SELECT bio, avatar_url, is_verified, wellness_goals, posts_count, followers_count, \
             following_count FROM social_profiles WHERE user_id = ?",
        )
        .bind(target_id)
        .fetch_one(&mut *conn)
        .await?;

        let relation = sqlx::query(
            "SELECT \
             EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2) AS is_following, \
             EXISTS(SELECT 1 FROM follows WHERE follower_id = ?2 AND following_id = ?1) AS is_followed_by, \
             (SELECT COUNT(*) FROM follows a JOIN follows b ON a.following_id = b.following_id \
              WHERE a.follower_id = ?1 AND b.follower_id = ?2) AS mutual_connections",
        )
        .bind(viewer)
        .bind(target_id)
        .fetch_one(&mut *conn)
        .await?;

        let goals: String = row.try_get("wellness_goals")?;
        let wellness_goals: Vec<String> = serde_json::from_str(&goals).unwrap_or_default();

        Ok(SocialProfile {
            user: load_basic_user(&mut conn, target_id).await?,
            bio: row.try_get("bio")?,
            avatar_url: row.try_get("avatar_url")?,
            is_verified: row.try_get("is_verified")?,
            wellness_goals,
            posts_count: row.try_get("posts_count")?,
            followers_count: row.try_get("followers_count")?,
            following_count: row.try_get("following_count")?,
            is_following: relation.try_get("is_following")?,
            is_followed_by: relation.try_get("is_followed_by")?,
            mutual_connections: relation.try_get("mutual_connections")?,
        })
    }

    /// People the user does not follow yet, ranked by how many of the
    /// user's followees already follow them.
    pub async fn suggested_users(&self, user_id: i64) -> Result<Vec<SuggestedUser>, SocialError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_SELECT}, COALESCE(sp.followers_count, 0) AS followers_count, \
             (SELECT COUNT(*) FROM follows f \
              WHERE f.following_id = u.id \
              AND f.follower_id IN (SELECT following_id FROM follows WHERE follower_id = ?1)) \
             AS mutual_count \
             FROM users u LEFT JOIN social_profiles sp ON sp.user_id = u.id \
             WHERE u.id <> ?1 AND u.is_active = 1 \
             AND u.id NOT IN (SELECT following_id FROM follows WHERE follower_id = ?1) \
             ORDER BY mutual_count DESC, followers_count DESC, u.id ASC LIMIT ?2"
        ))
        .bind(user_id)
        .bind(SUGGESTIONS)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SuggestedUser, SocialError> {
                Ok(SuggestedUser {
                    user: basic_user_from_row(row)?,
                    followers_count: row.try_get("followers_count")?,
                    mutual_count: row.try_get("mutual_count")?,
                })
            })
            .collect()
    }
}
