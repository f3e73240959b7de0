use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use wellzo_auth::UserRole;
use wellzo_database::format_timestamp;

use crate::engagement::{engagement_score, Counters};
use crate::error::SocialError;
use crate::models::{BasicUser, NotificationType};

/// Author columns selected alongside a row joined through [`USER_JOIN`].
pub(crate) const USER_SELECT: &str = "u.public_id AS user_public_id, u.email AS user_email, \
     u.name AS user_name, u.role AS user_role, u.is_verified AS user_verified, \
     u.profile_picture_url AS user_picture, sp.avatar_url AS user_avatar_url";

/// Joins `users u` and `social_profiles sp` onto a table aliased `t`.
pub(crate) const USER_JOIN: &str =
    "JOIN users u ON u.id = t.user_id LEFT JOIN social_profiles sp ON sp.user_id = u.id";

pub(crate) fn basic_user_from_row(row: &SqliteRow) -> Result<BasicUser, sqlx::Error> {
    let role: String = row.try_get("user_role")?;
    Ok(basic_user(
        row.try_get("user_public_id")?,
        row.try_get("user_email")?,
        row.try_get("user_name")?,
        UserRole::parse(&role),
        row.try_get("user_verified")?,
        row.try_get("user_picture")?,
        row.try_get("user_avatar_url")?,
    ))
}

pub(crate) fn basic_user(
    public_id: String,
    email: String,
    name: String,
    role: Option<UserRole>,
    verified: bool,
    picture: Option<String>,
    social_avatar: Option<String>,
) -> BasicUser {
    let username = email.split('@').next().unwrap_or_default().to_string();
    let mut parts = name.split_whitespace();
    let first_name = parts.next().unwrap_or_default().to_string();
    let last_name = parts.collect::<Vec<_>>().join(" ");

    let avatar = picture
        .filter(|url| !url.is_empty())
        .or(social_avatar.filter(|url| !url.is_empty()))
        .unwrap_or_else(|| {
            let label = if name.trim().is_empty() { &username } else { &name };
            format!(
                "https://ui-avatars.com/api/?name={}&background=10b981&color=ffffff",
                label.trim().replace(' ', "+")
            )
        });

    BasicUser {
        id: public_id,
        email,
        name,
        username,
        first_name,
        last_name,
        avatar,
        verified,
        title: role.map_or("Community Member", |role| role.title()).to_string(),
    }
}

/// Short name used in notification text.
pub(crate) fn display_name(user: &BasicUser) -> &str {
    if user.first_name.is_empty() {
        &user.username
    } else {
        &user.first_name
    }
}

pub(crate) async fn load_basic_user(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<BasicUser, SocialError> {
    let row = sqlx::query(&format!(
        "SELECT {USER_SELECT} FROM (SELECT ? AS user_id) t {USER_JOIN}"
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(SocialError::NotFound("User"))?;

    Ok(basic_user_from_row(&row)?)
}

pub(crate) async fn user_id_for(
    conn: &mut SqliteConnection,
    public_id: &str,
) -> Result<i64, SocialError> {
    sqlx::query_scalar("SELECT id FROM users WHERE public_id = ?")
        .bind(public_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(SocialError::NotFound("User"))
}

pub(crate) async fn ensure_social_profile(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<(), SocialError> {
    let now = format_timestamp(Utc::now());
    sqlx::query(
        "INSERT INTO social_profiles (user_id, created_at, updated_at) VALUES (?, ?, ?) \
         ON CONFLICT(user_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Add `delta` to a social profile counter, never going below zero.
pub(crate) async fn bump_profile_counter(
    conn: &mut SqliteConnection,
    user_id: i64,
    column: &'static str,
    delta: i64,
) -> Result<(), SocialError> {
    ensure_social_profile(conn, user_id).await?;
    sqlx::query(&format!(
        "UPDATE social_profiles SET {column} = MAX({column} + ?, 0), updated_at = ? WHERE user_id = ?"
    ))
    .bind(delta)
    .bind(format_timestamp(Utc::now()))
    .bind(user_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Add `delta` to a post counter, never going below zero.
pub(crate) async fn bump_post_counter(
    conn: &mut SqliteConnection,
    post_id: &str,
    column: &'static str,
    delta: i64,
) -> Result<(), SocialError> {
    sqlx::query(&format!(
        "UPDATE posts SET {column} = MAX({column} + ?, 0), updated_at = ? WHERE id = ?"
    ))
    .bind(delta)
    .bind(format_timestamp(Utc::now()))
    .bind(post_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) struct PostHeader {
    pub id: String,
    pub owner_id: i64,
    pub post_type: String,
}

pub(crate) async fn post_header(
    conn: &mut SqliteConnection,
    post_id: &str,
) -> Result<PostHeader, SocialError> {
    let row = sqlx::query("SELECT id, user_id, post_type FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(SocialError::NotFound("Post"))?;

    Ok(PostHeader {
        id: row.try_get("id")?,
        owner_id: row.try_get("user_id")?,
        post_type: row.try_get("post_type")?,
    })
}

/// Recompute and store the engagement score from the current counters.
pub(crate) async fn refresh_score(
    conn: &mut SqliteConnection,
    post_id: &str,
) -> Result<f64, SocialError> {
    let row = sqlx::query(
        "SELECT likes_count, loves_count, motivates_count, comments_count, shares_count, \
         views_count, created_at FROM posts WHERE id = ?",
    )
    .bind(post_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(SocialError::NotFound("Post"))?;

    let counters = Counters {
        likes: row.try_get("likes_count")?,
        loves: row.try_get("loves_count")?,
        motivates: row.try_get("motivates_count")?,
        comments: row.try_get("comments_count")?,
        shares: row.try_get("shares_count")?,
        views: row.try_get("views_count")?,
    };
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let score = engagement_score(&counters, created_at, Utc::now());

    sqlx::query("UPDATE posts SET engagement_score = ? WHERE id = ?")
        .bind(score)
        .bind(post_id)
        .execute(&mut *conn)
        .await?;

    Ok(score)
}

pub(crate) struct NewNotification<'a> {
    pub recipient: i64,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub post_id: Option<&'a str>,
    pub comment_id: Option<&'a str>,
    pub from_user: Option<i64>,
}

pub(crate) async fn insert_notification(
    conn: &mut SqliteConnection,
    notification: NewNotification<'_>,
) -> Result<String, SocialError> {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO notifications (id, user_id, notification_type, title, message, post_id, \
         comment_id, from_user_id, is_read, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(&id)
    .bind(notification.recipient)
    .bind(notification.kind.as_str())
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.post_id)
    .bind(notification.comment_id)
    .bind(notification.from_user)
    .bind(format_timestamp(Utc::now()))
    .execute(&mut *conn)
    .await?;
    Ok(id)
}

/// Relative age such as "3 hours ago", using the largest whole unit.
pub fn humanize_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    const UNITS: [(i64, &str); 6] = [
        (365 * 24 * 3600, "year"),
        (30 * 24 * 3600, "month"),
        (7 * 24 * 3600, "week"),
        (24 * 3600, "day"),
        (3600, "hour"),
        (60, "minute"),
    ];

    let elapsed = (now - then).num_seconds().max(0);
    let (count, unit) = UNITS
        .iter()
        .find(|(size, _)| elapsed >= *size)
        .map_or((0, "minute"), |(size, unit)| (elapsed / size, *unit));

    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}
