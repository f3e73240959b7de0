use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::SqliteConnection;
use wellzo_database::format_timestamp;

use crate::error::SocialError;

const MAX_HASHTAG_LEN: usize = 100;

static HASHTAG_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"#(\w+)").ok());

/// Normalized, de-duplicated hashtag names from an explicit list plus any
/// `#word` tokens in the content, in first-seen order.
pub fn extract_hashtags(content: &str, explicit: &[String]) -> Vec<String> {
    let inline = HASHTAG_RE
        .as_ref()
        .map(|re| {
            re.captures_iter(content)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let mut names: Vec<String> = Vec::new();
    for raw in explicit.iter().chain(inline.iter()) {
        let name = raw.trim().trim_start_matches('#').trim().to_lowercase();
        if name.is_empty() || name.chars().count() > MAX_HASHTAG_LEN {
            continue;
        }
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

pub(crate) async fn attach(
    conn: &mut SqliteConnection,
    post_id: &str,
    names: &[String],
) -> Result<(), SocialError> {
    let now = format_timestamp(Utc::now());
    for name in names {
        sqlx::query(
            "INSERT INTO hashtags (name, posts_count, trending_score, created_at) VALUES (?, 0, 0, ?) \
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(&now)
        .execute(&mut *conn)
        .await?;

        let hashtag_id: i64 = sqlx::query_scalar("SELECT id FROM hashtags WHERE name = ?")
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;

        let linked = sqlx::query(
            "INSERT INTO post_hashtags (post_id, hashtag_id) VALUES (?, ?) \
             ON CONFLICT(post_id, hashtag_id) DO NOTHING",
        )
        .bind(post_id)
        .bind(hashtag_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if linked > 0 {
            sqlx::query(
                "UPDATE hashtags SET posts_count = posts_count + 1, \
                 trending_score = trending_score + 1 WHERE id = ?",
            )
            .bind(hashtag_id)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

/// Release the post's hashtags ahead of deleting it.
pub(crate) async fn detach(conn: &mut SqliteConnection, post_id: &str) -> Result<(), SocialError> {
    sqlx::query(
        "UPDATE hashtags SET posts_count = MAX(posts_count - 1, 0), \
         trending_score = MAX(trending_score - 1, 0) \
         WHERE id IN (SELECT hashtag_id FROM post_hashtags WHERE post_id = ?)",
    )
    .bind(post_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn tags_for(
    conn: &mut SqliteConnection,
    post_id: &str,
) -> Result<Vec<String>, SocialError> {
    Ok(sqlx::query_scalar(
        "SELECT h.name FROM post_hashtags ph JOIN hashtags h ON h.id = ph.hashtag_id \
         WHERE ph.post_id = ? ORDER BY h.name",
    )
    .bind(post_id)
    .fetch_all(&mut *conn)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_explicit_and_inline_tags() {
        let tags = extract_hashtags(
            "Morning run done #Cardio #health and more #cardio",
            &["#Running".to_string(), "  ".to_string(), "health".to_string()],
        );
        assert_eq!(tags, vec!["running", "health", "cardio"]);
    }

    #[test]
    fn ignores_bare_hash() {
        assert!(extract_hashtags("# nothing here", &[]).is_empty());
    }
}
