use std::collections::BTreeSet;

use chrono::Utc;
use sqlx::{Row, SqliteConnection};
use tracing::info;
use wellzo_database::{format_timestamp, WriteTransaction};

use crate::error::AuthError;
use crate::models::{ProfileUpdate, User, UserProfile, USER_COLUMNS};
use crate::password::verify_password;
use crate::validation::{normalize_email, validate_profile};
use crate::Authenticator;

const PROFILE_COLUMNS: &str = "full_name, age, date_of_birth, gender, nationality, state, city, \
     preferred_language, bio, location, profile_picture, created_at, updated_at";

impl Authenticator {
    pub async fn user_by_id(&self, id: i64) -> Result<User, AuthError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(User::from_row(&row)?)
    }

    pub async fn user_by_public_id(&self, public_id: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE public_id = ?"))
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(User::from_row).transpose()?)
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(User::from_row).transpose()?)
    }

    pub(crate) async fn require_user_by_email(&self, email: &str) -> Result<User, AuthError> {
        self.user_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// The user's profile, created empty on first access.
    pub async fn get_profile(&self, user_id: i64) -> Result<UserProfile, AuthError> {
        let now = format_timestamp(Utc::now());
        sqlx::query(
            "INSERT INTO user_profiles (user_id, created_at, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserProfile::from_row(&row)?)
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        update: ProfileUpdate,
    ) -> Result<UserProfile, AuthError> {
        validate_profile(&update)?;
        self.get_profile(user_id).await?;

        sqlx::query(
            "UPDATE user_profiles SET \
             full_name = COALESCE(?, full_name), \
             age = COALESCE(?, age), \
             date_of_birth = COALESCE(?, date_of_birth), \
             gender = COALESCE(?, gender), \
             nationality = COALESCE(?, nationality), \
             state = COALESCE(?, state), \
             city = COALESCE(?, city), \
             preferred_language = COALESCE(?, preferred_language), \
             bio = COALESCE(?, bio), \
             location = COALESCE(?, location), \
             profile_picture = COALESCE(?, profile_picture), \
             updated_at = ? \
             WHERE user_id = ?",
        )
        .bind(update.full_name.as_deref().map(str::trim))
        .bind(update.age)
        .bind(update.date_of_birth.as_deref())
        .bind(update.gender.as_deref())
        .bind(update.nationality.as_deref())
        .bind(update.state.as_deref())
        .bind(update.city.as_deref())
        .bind(update.preferred_language.as_deref())
        .bind(update.bio.as_deref())
        .bind(update.location.as_deref())
        .bind(update.profile_picture.as_deref())
        .bind(format_timestamp(Utc::now()))
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        self.get_profile(user_id).await
    }

    pub async fn delete_profile(&self, user_id: i64) -> Result<(), AuthError> {
        let deleted = sqlx::query("DELETE FROM user_profiles WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(AuthError::ProfileNotFound);
        }
        Ok(())
    }

    /// Remove the account and everything hanging off it. Password accounts
    /// must confirm with their current password.
    ///
    /// Counters other users' posts, comments, profiles and hashtags kept for
    /// the rows that cascade away are released in the same transaction. The
    /// returned posts still carry engagement scores computed from the old
    /// counters.
    pub async fn delete_account(
        &self,
        user: &User,
        password: Option<&str>,
    ) -> Result<AccountRemoval, AuthError> {
        if user.has_password {
            let hash: Option<String> =
                sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
                    .bind(user.id)
                    .fetch_optional(&self.pool)
                    .await?
                    .flatten();

            let confirmed = match (hash, password) {
                (Some(hash), Some(password)) => verify_password(password, &hash)?,
                _ => false,
            };
            if !confirmed {
                return Err(AuthError::InvalidCredentials);
            }
        }

        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let touched_posts = release_post_counters(&mut tx, user.id).await?;
        release_graph_counters(&mut tx, user.id).await?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(AuthError::UserNotFound);
        }
        tx.commit().await?;

        info!(
            user_id = user.id,
            touched_posts = touched_posts.len(),
            "account deleted"
        );
        Ok(AccountRemoval { touched_posts })
    }
}

/// Result of [`Authenticator::delete_account`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountRemoval {
    /// Posts of other users whose counters dropped.
    pub touched_posts: Vec<String>,
}

/// Rows the user left on other users' posts, tallied per post and kind.
/// Comments include every reply below one of the user's comments.
const POST_TALLIES: &str = "\
    WITH RECURSIVE removed_comments(id) AS ( \
        SELECT id FROM comments WHERE user_id = ?1 \
        UNION SELECT c.id FROM comments c JOIN removed_comments rc ON c.parent_id = rc.id \
    ) \
    SELECT r.post_id AS post_id, r.reaction_type AS kind, COUNT(*) AS n \
      FROM reactions r JOIN posts p ON p.id = r.post_id \
     WHERE r.user_id = ?1 AND p.user_id <> ?1 GROUP BY r.post_id, r.reaction_type \
    UNION ALL \
    SELECT b.post_id, 'bookmark', COUNT(*) \
      FROM bookmarks b JOIN posts p ON p.id = b.post_id \
     WHERE b.user_id = ?1 AND p.user_id <> ?1 GROUP BY b.post_id \
    UNION ALL \
    SELECT s.post_id, 'share', COUNT(*) \
      FROM shares s JOIN posts p ON p.id = s.post_id \
     WHERE s.user_id = ?1 AND p.user_id <> ?1 GROUP BY s.post_id \
    UNION ALL \
    SELECT c.post_id, 'comment', COUNT(*) \
      FROM comments c JOIN removed_comments rc ON rc.id = c.id JOIN posts p ON p.id = c.post_id \
     WHERE p.user_id <> ?1 GROUP BY c.post_id";

fn tally_column(kind: &str) -> Option<&'static str> {
    match kind {
        "liked" => Some("likes_count"),
        "loved" => Some("loves_count"),
        "motivated" => Some("motivates_count"),
        "bookmark" => Some("bookmarks_count"),
        "share" => Some("shares_count"),
        "comment" => Some("comments_count"),
        _ => None,
    }
}

async fn release_post_counters(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<String>, AuthError> {
    let tallies = sqlx::query(POST_TALLIES)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

    let now = format_timestamp(Utc::now());
    let mut touched = BTreeSet::new();
    for row in &tallies {
        let post_id: String = row.try_get("post_id")?;
        let kind: String = row.try_get("kind")?;
        let n: i64 = row.try_get("n")?;
        let Some(column) = tally_column(&kind) else {
            continue;
        };
        sqlx::query(&format!(
            "UPDATE posts SET {column} = MAX({column} - ?, 0), updated_at = ? WHERE id = ?"
        ))
        .bind(n)
        .bind(&now)
        .bind(&post_id)
        .execute(&mut *conn)
        .await?;
        touched.insert(post_id);
    }

    // comments of other users the account liked
    sqlx::query(
        "UPDATE comments SET likes_count = MAX(likes_count - 1, 0) \
         WHERE user_id <> ?1 AND id IN (SELECT comment_id FROM comment_likes WHERE user_id = ?1)",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    // hashtags lose the account's own posts
    sqlx::query(
        "UPDATE hashtags SET \
             posts_count = MAX(posts_count - (SELECT COUNT(*) FROM post_hashtags ph \
                 JOIN posts p ON p.id = ph.post_id \
                 WHERE ph.hashtag_id = hashtags.id AND p.user_id = ?1), 0), \
             trending_score = MAX(trending_score - (SELECT COUNT(*) FROM post_hashtags ph \
                 JOIN posts p ON p.id = ph.post_id \
                 WHERE ph.hashtag_id = hashtags.id AND p.user_id = ?1), 0) \
         WHERE id IN (SELECT ph.hashtag_id FROM post_hashtags ph \
             JOIN posts p ON p.id = ph.post_id WHERE p.user_id = ?1)",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(touched.into_iter().collect())
}

async fn release_graph_counters(conn: &mut SqliteConnection, user_id: i64) -> Result<(), AuthError> {
    let now = format_timestamp(Utc::now());
    sqlx::query(
        "UPDATE social_profiles SET followers_count = MAX(followers_count - 1, 0), updated_at = ?2 \
         WHERE user_id IN (SELECT following_id FROM follows WHERE follower_id = ?1)",
    )
    .bind(user_id)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE social_profiles SET following_count = MAX(following_count - 1, 0), updated_at = ?2 \
         WHERE user_id IN (SELECT follower_id FROM follows WHERE following_id = ?1)",
    )
    .bind(user_id)
    .bind(&now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
