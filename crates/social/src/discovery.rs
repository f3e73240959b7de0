use chrono::{Duration, TimeZone, Utc};
use sqlx::Row;
use tracing::debug;
use wellzo_database::format_timestamp;

use crate::cache::{COMMUNITY_STATS_KEY, TRENDING_TOPICS_KEY};
use crate::error::SocialError;
use crate::models::{CommunityStats, DiscoverSort, Post, PostType, TrendingTopic};
use crate::pagination::{Page, PageRequest};
use crate::posts::{hydrate_post, post_select};
use crate::SocialService;

const TRENDING_LIMIT: i64 = 10;
const DEFAULT_CATEGORY: &str = "Wellness";

/// Week-over-week change in post volume, e.g. "+12.5%".
pub(crate) fn weekly_growth(this_week: i64, last_week: i64) -> String {
    if last_week > 0 {
        let rate = (this_week - last_week) as f64 / last_week as f64 * 100.0;
        if rate > 0.0 {
            format!("+{rate:.1}%")
        } else {
            format!("{rate:.1}%")
        }
    } else if this_week > 0 {
        "+100%".to_string()
    } else {
        "0%".to_string()
    }
}

/// Growth label bounded to 5..25 percent. Bounds print as whole numbers,
/// anything between keeps at least one decimal place.
pub(crate) fn topic_growth(trending_score: f64) -> String {
    let rate = trending_score * 10.0;
    if rate <= 5.0 {
        "+5%".to_string()
    } else if rate >= 25.0 {
        "+25%".to_string()
    } else if rate.fract() == 0.0 {
        format!("+{rate:.1}%")
    } else {
        format!("+{rate}%")
    }
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `LIKE` pattern matching `term` anywhere, with wildcards escaped.
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl SocialService {
    pub async fn community_stats(&self) -> Result<CommunityStats, SocialError> {
        if let Some(stats) = self.cache.get_json(COMMUNITY_STATS_KEY).await {
            return Ok(stats);
        }

        let now = Utc::now();
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(now);
        let week_start = midnight - Duration::days(7);
        let previous_week_start = week_start - Duration::days(7);
        let seven_days_ago = format_timestamp(now - Duration::days(7));

        let mut conn = self.pool.acquire().await?;

        let total_posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&mut *conn)
            .await?;
        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *conn)
            .await?;
        let posts_today: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE created_at >= ?")
            .bind(format_timestamp(midnight))
            .fetch_one(&mut *conn)
            .await?;
        let this_week: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE created_at >= ?")
            .bind(format_timestamp(week_start))
            .fetch_one(&mut *conn)
            .await?;
        let last_week: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts WHERE created_at >= ? AND created_at < ?",
        )
        .bind(format_timestamp(previous_week_start))
        .bind(format_timestamp(week_start))
        .fetch_one(&mut *conn)
        .await?;

        let averages = sqlx::query(
            "SELECT AVG(likes_count) AS avg_likes, AVG(comments_count) AS avg_comments, \
             AVG(shares_count) AS avg_shares FROM posts WHERE created_at >= ?",
        )
        .bind(&seven_days_ago)
        .fetch_one(&mut *conn)
        .await?;
        let avg_likes: Option<f64> = averages.try_get("avg_likes")?;
        let avg_comments: Option<f64> = averages.try_get("avg_comments")?;
        let avg_shares: Option<f64> = averages.try_get("avg_shares")?;
        let engagement_rate = (avg_likes.unwrap_or(0.0)
            + avg_comments.unwrap_or(0.0) * 2.0
            + avg_shares.unwrap_or(0.0) * 3.0)
            / 10.0;

        let top_type: Option<String> = sqlx::query_scalar(
            "SELECT post_type FROM posts WHERE created_at >= ? \
             GROUP BY post_type ORDER BY COUNT(*) DESC, post_type ASC LIMIT 1",
        )
        .bind(&seven_days_ago)
        .fetch_optional(&mut *conn)
        .await?;

        let stats = CommunityStats {
            total_posts,
            total_users,
            posts_today,
            engagement_rate: round_one(engagement_rate),
            trending_category: top_type
                .as_deref()
                .and_then(PostType::parse)
                .map_or(DEFAULT_CATEGORY, |kind| kind.title())
                .to_string(),
            weekly_growth: weekly_growth(this_week, last_week),
        };

        self.cache
            .set_json(COMMUNITY_STATS_KEY, &stats, self.ttls.community_stats)
            .await;
        debug!(total_posts, total_users, "community stats computed");
        Ok(stats)
    }

    /// Hashtags most used by posts from the last week.
    pub async fn trending_topics(&self) -> Result<Vec<TrendingTopic>, SocialError> {
        if let Some(topics) = self.cache.get_json(TRENDING_TOPICS_KEY).await {
            return Ok(topics);
        }

        let rows = sqlx::query(
            "SELECT h.name, h.posts_count, h.trending_score, COUNT(*) AS recent_posts \
             FROM hashtags h \
             JOIN post_hashtags ph ON ph.hashtag_id = h.id \
             JOIN posts p ON p.id = ph.post_id \
             WHERE p.created_at >= ? \
             GROUP BY h.id \
             ORDER BY recent_posts DESC, h.posts_count DESC, h.name ASC LIMIT ?",
        )
        .bind(format_timestamp(Utc::now() - Duration::days(7)))
        .bind(TRENDING_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let topics = rows
            .iter()
            .map(|row| -> Result<TrendingTopic, SocialError> {
                let score: f64 = row.try_get("trending_score")?;
                Ok(TrendingTopic {
                    name: row.try_get("name")?,
                    posts_count: row.try_get("posts_count")?,
                    growth: topic_growth(score),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.cache
            .set_json(TRENDING_TOPICS_KEY, &topics, self.ttls.trending)
            .await;
        Ok(topics)
    }

    /// Search and browse posts. `search` matches content or a hashtag name.
    pub async fn discover(
        &self,
        viewer: i64,
        search: Option<&str>,
        category: Option<PostType>,
        sort: DiscoverSort,
        page: PageRequest,
    ) -> Result<Page<Post>, SocialError> {
        let search = search.map(str::trim).filter(|term| !term.is_empty());
        let content_pattern = search.map(contains_pattern);
        let tag_pattern = search.map(|term| contains_pattern(&term.replace('#', "").to_lowercase()));
        let category = category.map(|kind| kind.as_str());

        let order = match sort {
            DiscoverSort::Trending => "t.engagement_score DESC, t.created_at DESC",
            DiscoverSort::Popular => {
                "(t.likes_count + t.loves_count + t.motivates_count) DESC, t.created_at DESC"
            }
            DiscoverSort::Discussed => "t.comments_count DESC, t.created_at DESC",
            DiscoverSort::Recent => "t.created_at DESC",
        };

        let filter = "WHERE (?1 IS NULL OR t.post_type = ?1) \
             AND (?2 IS NULL OR t.content LIKE ?2 ESCAPE '\\' OR EXISTS (\
                 SELECT 1 FROM post_hashtags ph JOIN hashtags h ON h.id = ph.hashtag_id \
                 WHERE ph.post_id = t.id AND h.name LIKE ?3 ESCAPE '\\'))";

        let mut conn = self.pool.acquire().await?;

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM posts t {filter}"))
            .bind(category)
            .bind(content_pattern.as_deref())
            .bind(tag_pattern.as_deref())
            .fetch_one(&mut *conn)
            .await?;

        let rows = sqlx::query(&format!(
            "{} {filter} ORDER BY {order} LIMIT ?4 OFFSET ?5",
            post_select()
        ))
        .bind(category)
        .bind(content_pattern.as_deref())
        .bind(tag_pattern.as_deref())
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
}
