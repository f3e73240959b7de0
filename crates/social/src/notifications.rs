use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;

use crate::error::SocialError;
use crate::models::{MarkedRead, Notification, NotificationType, UnreadCount};
use crate::pagination::{Page, PageRequest};
use crate::support::{basic_user, humanize_since};
use crate::SocialService;

impl SocialService {
    /// Newest-first notifications. `mark_read` is a comma separated list of
    /// ids marked read before listing; ids owned by other users are ignored.
    pub async fn list_notifications(
        &self,
        user_id: i64,
        mark_read: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Notification>, SocialError> {
        let ids: Vec<&str> = mark_read
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect();

        let mut conn = self.pool.acquire().await?;

        if !ids.is_empty() {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ? AND id IN ({placeholders})"
            );
            let mut query = sqlx::query(&sql).bind(user_id);
            for id in &ids {
                query = query.bind(*id);
            }
            let marked = query.execute(&mut *conn).await?.rows_affected();
            debug!(user_id, marked, "notifications marked read");
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

        let rows = sqlx::query(
            "SELECT n.id, n.notification_type, n.title, n.message, n.post_id, n.comment_id, \
             n.is_read, n.created_at, u.public_id AS from_public_id, u.email AS from_email, \
             u.name AS from_name, u.role AS from_role, u.is_verified AS from_verified, \
             u.profile_picture_url AS from_picture, sp.avatar_url AS from_avatar_url \
             FROM notifications n \
             LEFT JOIN users u ON u.id = n.from_user_id \
             LEFT JOIN social_profiles sp ON sp.user_id = u.id \
             WHERE n.user_id = ? ORDER BY n.created_at DESC, n.rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        let now = Utc::now();
        let mut notifications = Vec::with_capacity(rows.len());
        for row in &rows {
            let kind: String = row.try_get("notification_type")?;
            let created_at: DateTime<Utc> = row.try_get("created_at")?;
            let from_public_id: Option<String> = row.try_get("from_public_id")?;

            let from_user = match from_public_id {
                Some(public_id) => {
                    let role: String = row.try_get("from_role")?;
                    Some(basic_user(
                        public_id,
                        row.try_get("from_email")?,
                        row.try_get("from_name")?,
                        wellzo_auth::UserRole::parse(&role),
                        row.try_get("from_verified")?,
                        row.try_get("from_picture")?,
                        row.try_get("from_avatar_url")?,
                    ))
                }
                None => None,
            };

            notifications.push(Notification {
                id: row.try_get("id")?,
                notification_type: NotificationType::parse(&kind).unwrap_or(NotificationType::Post),
                title: row.try_get("title")?,
                message: row.try_get("message")?,
                post_id: row.try_get("post_id")?,
                comment_id: row.try_get("comment_id")?,
                from_user,
                is_read: row.try_get("is_read")?,
                timestamp: humanize_since(created_at, now),
                created_at,
            });
        }

        Ok(Page::new(&page, count, notifications))
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<UnreadCount, SocialError> {
        let unread_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(UnreadCount { unread_count })
    }

    pub async fn mark_all_read(&self, user_id: i64) -> Result<MarkedRead, SocialError> {
        let updated =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
                .bind(user_id)
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(MarkedRead { updated })
    }
}
