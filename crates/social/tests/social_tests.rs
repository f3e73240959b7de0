use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;
use wellzo_auth::{Authenticator, Mailer};
use wellzo_config::{AuthConfig, DatabaseConfig, OtpConfig};
use wellzo_database::format_timestamp;
use wellzo_social::cache::user_activity_key;
use wellzo_social::{
    Cache, CacheTtls, DiscoverSort, FeedSort, Media, MediaType, NewPost, NotificationType,
    PageRequest, PostType, ReactionType, SocialError, SocialService,
};

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

struct TestContext {
    pool: SqlitePool,
    social: SocialService,
    _temp_dir: TempDir,
}

struct TestUser {
    id: i64,
    public_id: String,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("social.sqlite");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 5,
        };
        let pool = wellzo_database::initialize_database(&config).await?;
        let social = SocialService::new(pool.clone(), Cache::memory(), CacheTtls::default());

        Ok(Self {
            pool,
            social,
            _temp_dir: temp_dir,
        })
    }

    async fn user(&self, handle: &str, name: &str) -> TestResult<TestUser> {
        let now = format_timestamp(Utc::now());
        let public_id = format!("pub-{handle}");
        let id = sqlx::query(
            "INSERT INTO users (public_id, email, name, role, is_active, is_verified, created_at, updated_at) \
             VALUES (?, ?, ?, 'student', 1, 1, ?, ?)",
        )
        .bind(&public_id)
        .bind(format!("{handle}@example.com"))
        .bind(name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(TestUser { id, public_id })
    }

    async fn post(&self, author: &TestUser, content: &str) -> TestResult<String> {
        let post = self
            .social
            .create_post(
                author.id,
                NewPost {
                    post_type: PostType::Fitness,
                    content: content.to_string(),
                    ..NewPost::default()
                },
            )
            .await?;
        Ok(post.id)
    }

    async fn profile_counts(&self, user: &TestUser) -> TestResult<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(followers_count, 0), COALESCE(following_count, 0) \
             FROM users u LEFT JOIN social_profiles sp ON sp.user_id = u.id WHERE u.id = ?",
        )
        .bind(user.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn notification_count(&self, user: &TestUser, kind: NotificationType) -> TestResult<i64> {
        Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND notification_type = ?",
        )
        .bind(user.id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?)
    }
}

#[tokio::test]
async fn create_post_collects_tags_media_and_notifies_followers() -> TestResult {
    let ctx = TestContext::new().await?;
    let author = ctx.user("asha", "Asha Menon").await?;
    let fan = ctx.user("ravi", "Ravi K").await?;
    ctx.social.toggle_follow(fan.id, &author.public_id).await?;

    let post = ctx
        .social
        .create_post(
            author.id,
            NewPost {
                post_type: PostType::Nutrition,
                content: "Overnight oats with chia #Breakfast #protein".into(),
                media: vec![Media {
                    media_type: MediaType::Image,
                    file_url: "https://cdn.example.com/oats.jpg".into(),
                    thumbnail_url: None,
                }],
                hashtags: vec!["#MealPrep".into()],
                metrics: Some(serde_json::json!({"calories": 320})),
            },
        )
        .await?;

    assert_eq!(post.post_type, PostType::Nutrition);
    assert_eq!(post.tags, vec!["breakfast", "mealprep", "protein"]);
    assert_eq!(post.media.len(), 1);
    assert_eq!(post.metrics["calories"], 320);
    assert_eq!(post.user.first_name, "Asha");
    assert_eq!(post.timestamp, "0 minutes ago");

    let posts_count: i64 =
        sqlx::query_scalar("SELECT posts_count FROM social_profiles WHERE user_id = ?")
            .bind(author.id)
            .fetch_one(&ctx.pool)
            .await?;
    assert_eq!(posts_count, 1);

    let title: String = sqlx::query_scalar(
        "SELECT title FROM notifications WHERE user_id = ? AND notification_type = 'post'",
    )
    .bind(fan.id)
    .fetch_one(&ctx.pool)
    .await?;
    assert_eq!(title, "New post from Asha");
    Ok(())
}

#[tokio::test]
async fn blank_post_is_rejected() -> TestResult {
    let ctx = TestContext::new().await?;
    let author = ctx.user("blank", "Blank").await?;
    let result = ctx
        .social
        .create_post(
            author.id,
            NewPost {
                content: "   ".into(),
                ..NewPost::default()
            },
        )
        .await;
    assert!(matches!(result, Err(SocialError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn same_reaction_twice_restores_counts() -> TestResult {
    let ctx = TestContext::new().await?;
    let author = ctx.user("owner", "Owner One").await?;
    let reader = ctx.user("reader", "Reader Two").await?;
    let post_id = ctx.post(&author, "Leg day").await?;

    let before = ctx.social.get_post(reader.id, &post_id).await?;

    let added = ctx.social.toggle_reaction(reader.id, &post_id, "loved").await?;
    assert_eq!(added.reaction_type, Some(ReactionType::Loved));
    assert_eq!(added.counts.loves, 1);
    let reacted = ctx.social.get_post(reader.id, &post_id).await?;
    assert!(reacted.reactions.loved);
    assert!(reacted.engagement_score > before.engagement_score);

    let removed = ctx.social.toggle_reaction(reader.id, &post_id, "loved").await?;
    assert_eq!(removed.message, "Reaction removed");
    assert_eq!(removed.reaction_type, None);

    let after = ctx.social.get_post(reader.id, &post_id).await?;
    assert_eq!(after.likes_count, before.likes_count);
    assert_eq!(after.loves_count, before.loves_count);
    assert_eq!(after.motivates_count, before.motivates_count);
    assert!(!after.reactions.loved);
    Ok(())
}

#[tokio::test]
async fn switching_reaction_moves_the_count() -> TestResult {
    let ctx = TestContext::new().await?;
    let author = ctx.user("mover", "Mover").await?;
    let reader = ctx.user("switcher", "Switcher").await?;
    let post_id = ctx.post(&author, "Morning stretch").await?;

    ctx.social.toggle_reaction(reader.id, &post_id, "liked").await?;
    let switched = ctx
        .social
        .toggle_reaction(reader.id, &post_id, "motivated")
        .await?;
    assert_eq!(switched.counts.likes, 0);
    assert_eq!(switched.counts.motivates, 1);
    assert_eq!(
        ctx.notification_count(&author, NotificationType::Motivate).await?,
        1
    );

    let invalid = ctx.social.toggle_reaction(reader.id, &post_id, "angry").await;
    assert!(matches!(invalid, Err(SocialError::Validation(_))));

    let missing = ctx.social.toggle_reaction(reader.id, "nope", "liked").await;
    assert!(matches!(missing, Err(SocialError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn reacting_to_own_post_does_not_notify() -> TestResult {
    let ctx = TestContext::new().await?;
    let author = ctx.user("self", "Self Fan").await?;
    let post_id = ctx.post(&author, "Personal best").await?;

    ctx.social.toggle_reaction(author.id, &post_id, "liked").await?;
    ctx.social.share_post(author.id, &post_id).await?;
    assert_eq!(ctx.notification_count(&author, NotificationType::Like).await?, 0);
    assert_eq!(ctx.notification_count(&author, NotificationType::Share).await?, 0);
    Ok(())
}

#[tokio::test]
async fn follow_then_unfollow_restores_counts() -> TestResult {
    let ctx = TestContext::new().await?;
    let a = ctx.user("alice", "Alice").await?;
    let b = ctx.user("bob", "Bob").await?;

    let a_before = ctx.profile_counts(&a).await?;
    let b_before = ctx.profile_counts(&b).await?;

    let followed = ctx.social.toggle_follow(a.id, &b.public_id).await?;
    assert!(followed.following);
    assert_eq!(ctx.profile_counts(&b).await?.0, b_before.0 + 1);
    assert_eq!(ctx.profile_counts(&a).await?.1, a_before.1 + 1);
    assert_eq!(ctx.notification_count(&b, NotificationType::Follow).await?, 1);

    let unfollowed = ctx.social.toggle_follow(a.id, &b.public_id).await?;
    assert!(!unfollowed.following);
    assert_eq!(ctx.profile_counts(&a).await?, a_before);
    assert_eq!(ctx.profile_counts(&b).await?, b_before);

    let own = ctx.social.toggle_follow(a.id, &a.public_id).await;
    assert!(matches!(own, Err(SocialError::Validation(_))));
    let ghost = ctx.social.toggle_follow(a.id, "pub-ghost").await;
    assert!(matches!(ghost, Err(SocialError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn social_profile_reports_relationship() -> TestResult {
    let ctx = TestContext::new().await?;
    let a = ctx.user("ann", "Ann").await?;
    let b = ctx.user("ben", "Ben").await?;
    let c = ctx.user("cat", "Cat").await?;

    ctx.social.toggle_follow(a.id, &b.public_id).await?;
    ctx.social.toggle_follow(b.id, &a.public_id).await?;
    ctx.social.toggle_follow(a.id, &c.public_id).await?;
    ctx.social.toggle_follow(b.id, &c.public_id).await?;

    let profile = ctx.social.social_profile(a.id, &b.public_id).await?;
    assert!(profile.is_following);
    assert!(profile.is_followed_by);
    assert_eq!(profile.mutual_connections, 1);
    assert_eq!(profile.followers_count, 1);
    assert_eq!(profile.following_count, 2);
    Ok(())
}

#[tokio::test]
async fn suggestions_rank_by_mutual_connections() -> TestResult {
    let ctx = TestContext::new().await?;
    let me = ctx.user("me", "Me").await?;
    let friend = ctx.user("friend", "Friend").await?;
    let popular = ctx.user("popular", "Popular").await?;
    let stranger = ctx.user("stranger", "Stranger").await?;

    ctx.social.toggle_follow(me.id, &friend.public_id).await?;
    ctx.social.toggle_follow(friend.id, &popular.public_id).await?;

    let suggestions = ctx.social.suggested_users(me.id).await?;
    let ids: Vec<_> = suggestions.iter().map(|s| s.user.id.as_str()).collect();
    assert_eq!(ids.first().copied(), Some(popular.public_id.as_str()));
    assert!(ids.contains(&stranger.public_id.as_str()));
    assert!(!ids.contains(&friend.public_id.as_str()));
    assert!(!ids.contains(&me.public_id.as_str()));
    assert_eq!(suggestions[0].mutual_count, 1);
    Ok(())
}

#[tokio::test]
async fn comments_replies_and_likes() -> TestResult {
    let ctx = TestContext::new().await?;
    let author = ctx.user("poster", "Poster").await?;
    let reader = ctx.user("commenter", "Commenter").await?;
    let post_id = ctx.post(&author, "Meal prep Sunday").await?;
    let other_post = ctx.post(&author, "Another one").await?;

    let top = ctx
        .social
        .create_comment(reader.id, &post_id, "Looks great", None)
        .await?;
    ctx.social
        .create_comment(author.id, &post_id, "Thanks!", Some(&top.id))
        .await?;

    let wrong_parent = ctx
        .social
        .create_comment(reader.id, &other_post, "Misplaced", Some(&top.id))
        .await;
    assert!(matches!(wrong_parent, Err(SocialError::NotFound(_))));
    let blank = ctx.social.create_comment(reader.id, &post_id, " ", None).await;
    assert!(matches!(blank, Err(SocialError::Validation(_))));

    let liked = ctx.social.toggle_comment_like(author.id, &top.id).await?;
    assert!(liked.liked);
    assert_eq!(liked.likes_count, 1);

    let page = ctx
        .social
        .list_comments(author.id, &post_id, PageRequest::default())
        .await?;
    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].replies.len(), 1);
    assert!(page.results[0].user_liked);

    let post = ctx.social.get_post(author.id, &post_id).await?;
    assert_eq!(post.comments_count, 2);
    assert_eq!(post.comments_preview.len(), 1);
    assert_eq!(ctx.notification_count(&author, NotificationType::Comment).await?, 1);

    let unliked = ctx.social.toggle_comment_like(author.id, &top.id).await?;
    assert!(!unliked.liked);
    assert_eq!(unliked.likes_count, 0);
    Ok(())
}

#[tokio::test]
async fn bookmarks_shares_and_views_update_counters() -> TestResult {
    let ctx = TestContext::new().await?;
    let author = ctx.user("sharer", "Sharer").await?;
    let reader = ctx.user("saver", "Saver").await?;
    let post_id = ctx.post(&author, "Hydration check").await?;

    assert!(ctx.social.toggle_bookmark(reader.id, &post_id).await?.bookmarked);
    assert!(ctx.social.get_post(reader.id, &post_id).await?.bookmarked);
    assert!(!ctx.social.toggle_bookmark(reader.id, &post_id).await?.bookmarked);

    assert_eq!(ctx.social.share_post(reader.id, &post_id).await?.shares_count, 1);
    assert_eq!(ctx.notification_count(&author, NotificationType::Share).await?, 1);

    ctx.social.record_view(None, &post_id, Some("10.0.0.1")).await?;
    let views = ctx.social.record_view(Some(reader.id), &post_id, None).await?;
    assert_eq!(views.views_count, 2);

    let post = ctx.social.get_post(reader.id, &post_id).await?;
    assert_eq!(post.bookmarks_count, 0);
    assert!(post.engagement_score > 9.0);
    Ok(())
}

#[tokio::test]
async fn only_the_author_deletes_a_post() -> TestResult {
    let ctx = TestContext::new().await?;
    let author = ctx.user("writer", "Writer").await?;
    let other = ctx.user("intruder", "Intruder").await?;
    let post_id = ctx.post(&author, "Delete me #gone").await?;

    let forbidden = ctx.social.delete_post(other.id, &post_id).await;
    assert!(matches!(forbidden, Err(SocialError::Forbidden(_))));

    ctx.social.delete_post(author.id, &post_id).await?;
    let missing = ctx.social.get_post(author.id, &post_id).await;
    assert!(matches!(missing, Err(SocialError::NotFound(_))));

    let tag_count: i64 = sqlx::query_scalar("SELECT posts_count FROM hashtags WHERE name = 'gone'")
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(tag_count, 0);
    Ok(())
}

#[tokio::test]
async fn feed_sorting_and_filtering() -> TestResult {
    let ctx = TestContext::new().await?;
    let author = ctx.user("feeder", "Feeder").await?;
    let reader = ctx.user("scroller", "Scroller").await?;

    let quiet = ctx.post(&author, "Quiet post").await?;
    let loud = ctx.post(&author, "Loud post").await?;
    ctx.social
        .create_post(
            author.id,
            NewPost {
                post_type: PostType::Routine,
                content: "Newest routine".into(),
                ..NewPost::default()
            },
        )
        .await?;
    ctx.social.share_post(reader.id, &loud).await?;

    let recent = ctx
        .social
        .list_posts(reader.id, None, FeedSort::Recent, PageRequest::default())
        .await?;
    assert_eq!(recent.count, 3);
    assert_eq!(recent.results[0].content, "Newest routine");

    let trending = ctx
        .social
        .list_posts(reader.id, None, FeedSort::Trending, PageRequest::default())
        .await?;
    assert_eq!(trending.results[0].id, loud);

    let fitness = ctx
        .social
        .list_posts(
            reader.id,
            Some(PostType::Fitness),
            FeedSort::Recent,
            PageRequest::new(1, 1),
        )
        .await?;
    assert_eq!(fitness.count, 2);
    assert_eq!(fitness.results.len(), 1);
    assert_eq!(fitness.next, Some(2));
    assert_eq!(fitness.results[0].id, loud);
    assert_ne!(fitness.results[0].id, quiet);

    let activity: Option<String> = ctx
        .social
        .cache()
        .get_json(&user_activity_key(reader.id))
        .await;
    assert!(activity.is_some());
    Ok(())
}

#[tokio::test]
async fn discover_searches_content_and_hashtags() -> TestResult {
    let ctx = TestContext::new().await?;
    let author = ctx.user("finder", "Finder").await?;
    ctx.post(&author, "Evening yoga flow").await?;
    ctx.post(&author, "Recovery day #Yoga").await?;
    ctx.post(&author, "Pasta night").await?;

    let by_content = ctx
        .social
        .discover(
            author.id,
            Some("YOGA"),
            None,
            DiscoverSort::Recent,
            PageRequest::default(),
        )
        .await?;
    assert_eq!(by_content.count, 2);

    let by_tag = ctx
        .social
        .discover(
            author.id,
            Some("#yoga"),
            Some(PostType::Fitness),
            DiscoverSort::Trending,
            PageRequest::default(),
        )
        .await?;
    assert_eq!(by_tag.count, 1);
    assert_eq!(by_tag.results[0].tags, vec!["yoga"]);

    let other_category = ctx
        .social
        .discover(
            author.id,
            None,
            Some(PostType::Motivation),
            DiscoverSort::Discussed,
            PageRequest::default(),
        )
        .await?;
    assert_eq!(other_category.count, 0);
    Ok(())
}

#[tokio::test]
async fn community_stats_and_trending_topics() -> TestResult {
    let ctx = TestContext::new().await?;
    let author = ctx.user("stats", "Stats").await?;
    ctx.post(&author, "Run #cardio").await?;
    ctx.post(&author, "Swim #cardio #pool").await?;

    let old = ctx.post(&author, "Old news #archive").await?;
    sqlx::query("UPDATE posts SET created_at = ? WHERE id = ?")
        .bind(format_timestamp(Utc::now() - Duration::days(10)))
        .bind(&old)
        .execute(&ctx.pool)
        .await?;

    let stats = ctx.social.community_stats().await?;
    assert_eq!(stats.total_posts, 3);
    assert_eq!(stats.total_users, 1);
    assert_eq!(stats.trending_category, "Fitness");
    assert_eq!(stats.weekly_growth, "+100.0%");

    let topics = ctx.social.trending_topics().await?;
    assert_eq!(topics[0].name, "cardio");
    assert_eq!(topics[0].posts_count, 2);
    assert_eq!(topics[0].growth, "+20.0%");
    assert!(topics.iter().all(|topic| topic.name != "archive"));

    // served from cache until the entry expires
    ctx.post(&author, "Another #cardio").await?;
    assert_eq!(ctx.social.community_stats().await?.total_posts, 3);
    Ok(())
}

#[tokio::test]
async fn notifications_listing_marks_and_counts() -> TestResult {
    let ctx = TestContext::new().await?;
    let star = ctx.user("star", "Star").await?;
    let one = ctx.user("one", "One").await?;
    let two = ctx.user("two", "Two").await?;

    ctx.social.toggle_follow(one.id, &star.public_id).await?;
    ctx.social.toggle_follow(two.id, &star.public_id).await?;
    assert_eq!(ctx.social.unread_count(star.id).await?.unread_count, 2);

    let page = ctx
        .social
        .list_notifications(star.id, None, PageRequest::default())
        .await?;
    assert_eq!(page.count, 2);
    assert_eq!(page.results[0].title, "New follower!");
    assert_eq!(
        page.results[0].from_user.as_ref().map(|user| user.id.as_str()),
        Some(two.public_id.as_str())
    );

    let first_id = page.results[0].id.clone();
    let marked = ctx
        .social
        .list_notifications(star.id, Some(&format!("{first_id}, unknown")), PageRequest::default())
        .await?;
    assert!(marked.results.iter().any(|n| n.id == first_id && n.is_read));
    assert_eq!(ctx.social.unread_count(star.id).await?.unread_count, 1);

    // other users cannot mark someone else's notifications
    ctx.social
        .list_notifications(one.id, Some(&page.results[1].id), PageRequest::default())
        .await?;
    assert_eq!(ctx.social.unread_count(star.id).await?.unread_count, 1);

    assert_eq!(ctx.social.mark_all_read(star.id).await?.updated, 1);
    assert_eq!(ctx.social.unread_count(star.id).await?.unread_count, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reactions_and_follows_all_land() -> TestResult {
    let ctx = TestContext::new().await?;
    let author = ctx.user("popular", "Popular Coach").await?;
    let post_id = ctx.post(&author, "Ten thousand steps").await?;

    let mut fans = Vec::new();
    for index in 0..40 {
        fans.push(ctx.user(&format!("fan{index}"), &format!("Fan {index}")).await?);
    }

    let mut handles = Vec::new();
    for fan in &fans {
        let social = ctx.social.clone();
        let (fan_id, post_id, author_public) =
            (fan.id, post_id.clone(), author.public_id.clone());
        handles.push(tokio::spawn(async move {
            social.toggle_reaction(fan_id, &post_id, "liked").await?;
            social.toggle_follow(fan_id, &author_public).await?;
            Ok::<_, SocialError>(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let post = ctx.social.get_post(author.id, &post_id).await?;
    assert_eq!(post.likes_count, 40);
    assert_eq!(ctx.profile_counts(&author).await?.0, 40);
    assert_eq!(ctx.notification_count(&author, NotificationType::Like).await?, 40);
    Ok(())
}

#[tokio::test]
async fn deleting_an_account_releases_its_counters() -> TestResult {
    let ctx = TestContext::new().await?;
    let author = ctx.user("anchor", "Anchor").await?;
    let leaver = ctx.user("leaver", "Leaver").await?;
    let friend = ctx.user("friend", "Friend").await?;

    let post_id = ctx.post(&author, "Rest day #Recovery").await?;
    ctx.post(&leaver, "Foam rolling #recovery").await?;
    let before = ctx.social.get_post(author.id, &post_id).await?;

    ctx.social.toggle_follow(leaver.id, &author.public_id).await?;
    ctx.social.toggle_follow(author.id, &leaver.public_id).await?;
    ctx.social.toggle_reaction(leaver.id, &post_id, "loved").await?;
    ctx.social.toggle_bookmark(leaver.id, &post_id).await?;
    ctx.social.share_post(leaver.id, &post_id).await?;
    let thread = ctx
        .social
        .create_comment(leaver.id, &post_id, "Needed this", None)
        .await?;
    ctx.social
        .create_comment(friend.id, &post_id, "Same here", Some(&thread.id))
        .await?;
    let kept = ctx
        .social
        .create_comment(friend.id, &post_id, "Stretch too", None)
        .await?;
    ctx.social.toggle_comment_like(leaver.id, &kept.id).await?;

    let authenticator = Authenticator::new(
        ctx.pool.clone(),
        &AuthConfig::default(),
        &OtpConfig::default(),
        Mailer::Log,
    )?;
    let account = authenticator.user_by_id(leaver.id).await?;
    let removal = authenticator.delete_account(&account, None).await?;
    assert_eq!(removal.touched_posts, vec![post_id.clone()]);
    ctx.social.refresh_engagement(&removal.touched_posts).await?;

    let after = ctx.social.get_post(author.id, &post_id).await?;
    assert_eq!(after.loves_count, 0);
    assert_eq!(after.bookmarks_count, 0);
    assert_eq!(after.shares_count, 0);
    // the reply went with the comment it answered
    assert_eq!(after.comments_count, 1);
    assert!(after.engagement_score > before.engagement_score);
    assert!(after.engagement_score <= 5.0);

    let kept_likes: i64 = sqlx::query_scalar("SELECT likes_count FROM comments WHERE id = ?")
        .bind(&kept.id)
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(kept_likes, 0);
    assert_eq!(ctx.profile_counts(&author).await?, (0, 0));

    let tag_posts: i64 = sqlx::query_scalar("SELECT posts_count FROM hashtags WHERE name = 'recovery'")
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(tag_posts, 1);
    Ok(())
}
