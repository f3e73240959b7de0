//! Social layer of the Wellzo backend: posts and their engagement
//! counters, comments, the follow graph, notifications and the community
//! aggregates served from cache.

use sqlx::SqlitePool;
use wellzo_config::CacheConfig;

mod comments;
mod discovery;
mod follows;
mod hashtags;
mod notifications;
mod posts;
mod reactions;
mod support;

pub mod cache;
pub mod engagement;
pub mod error;
pub mod models;
pub mod pagination;

pub use cache::Cache;
pub use engagement::{engagement_score, Counters};
pub use error::SocialError;
pub use hashtags::extract_hashtags;
pub use models::*;
pub use pagination::{Page, PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use support::humanize_since;

/// Cache lifetimes in seconds.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub community_stats: u64,
    pub trending: u64,
    pub user_activity: u64,
}

impl From<&CacheConfig> for CacheTtls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            community_stats: config.community_stats_ttl_seconds,
            trending: config.trending_ttl_seconds,
            user_activity: config.user_activity_ttl_seconds,
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

#[derive(Clone)]
pub struct SocialService {
    pool: SqlitePool,
    cache: Cache,
    ttls: CacheTtls,
}

impl SocialService {
    pub fn new(pool: SqlitePool, cache: Cache, ttls: CacheTtls) -> Self {
        Self { pool, cache, ttls }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }
}
