//! Key/value cache for hot aggregates. Backed by Redis when configured,
//! otherwise by an in-process map with expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const COMMUNITY_STATS_KEY: &str = "community_stats";
pub const TRENDING_TOPICS_KEY: &str = "trending_topics";

pub fn user_activity_key(user_id: i64) -> String {
    format!("user_activity:{user_id}")
}

#[derive(Clone)]
pub enum Cache {
    Redis(ConnectionManager),
    Memory(Arc<Mutex<HashMap<String, (Instant, String)>>>),
}

impl Default for Cache {
    fn default() -> Self {
        Self::memory()
    }
}

impl Cache {
    pub fn memory() -> Self {
        Self::Memory(Arc::new(Mutex::new(HashMap::new())))
    }

    /// Connect to Redis, falling back to the in-process cache when the
    /// url is absent or the server is unreachable.
    pub async fn connect(redis_url: Option<&str>) -> Self {
        let Some(url) = redis_url else {
            return Self::memory();
        };

        match redis::Client::open(url) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(conn) => {
                    info!("redis connection established");
                    Self::Redis(conn)
                }
                Err(error) => {
                    warn!(%error, "failed to connect to redis, using in-memory cache");
                    Self::memory()
                }
            },
            Err(error) => {
                warn!(%error, "invalid redis url, using in-memory cache");
                Self::memory()
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self {
            Self::Redis(conn) => {
                let mut conn = conn.clone();
                match conn.get::<_, Option<String>>(key).await {
                    Ok(value) => value,
                    Err(error) => {
                        warn!(key, %error, "redis get failed");
                        None
                    }
                }
            }
            Self::Memory(entries) => {
                let mut entries = entries.lock().await;
                let now = Instant::now();
                let live = entries
                    .get(key)
                    .filter(|(expires, _)| *expires > now)
                    .map(|(_, value)| value.clone());
                if live.is_none() {
                    entries.remove(key);
                }
                live
            }
        }?;

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "cache hit");
                Some(value)
            }
            Err(error) => {
                warn!(key, %error, "discarding unreadable cache entry");
                self.delete(key).await;
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(error) => {
                warn!(key, %error, "failed to serialize cache entry");
                return;
            }
        };

        match self {
            Self::Redis(conn) => {
                let mut conn = conn.clone();
                if let Err(error) = conn.set_ex::<_, _, ()>(key, data, ttl_seconds).await {
                    warn!(key, %error, "redis set failed");
                }
            }
            Self::Memory(entries) => {
                let now = Instant::now();
                let mut entries = entries.lock().await;
                // write-only keys are never read back, so expiry happens here
                entries.retain(|_, (expires, _)| *expires > now);
                entries.insert(key.to_string(), (now + Duration::from_secs(ttl_seconds), data));
            }
        }
    }

    pub async fn delete(&self, key: &str) {
        match self {
            Self::Redis(conn) => {
                let mut conn = conn.clone();
                if let Err(error) = conn.del::<_, ()>(key).await {
                    warn!(key, %error, "redis delete failed");
                }
            }
            Self::Memory(entries) => {
                entries.lock().await.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_round_trip_and_delete() {
        let cache = Cache::memory();
        cache.set_json("stats", &vec![1, 2, 3], 60).await;
        assert_eq!(cache.get_json::<Vec<i32>>("stats").await, Some(vec![1, 2, 3]));

        cache.delete("stats").await;
        assert_eq!(cache.get_json::<Vec<i32>>("stats").await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = Cache::memory();
        cache.set_json("short", &"value", 0).await;
        assert_eq!(cache.get_json::<String>("short").await, None);
    }

    #[tokio::test]
    async fn writes_drop_expired_entries() {
        let cache = Cache::memory();
        cache.set_json("user_activity:1", &"feed", 0).await;
        cache.set_json("user_activity:2", &"feed", 0).await;
        cache.set_json("trending", &vec![1], 60).await;

        let Cache::Memory(entries) = &cache else {
            panic!("expected the memory backend");
        };
        let keys: Vec<String> = entries.lock().await.keys().cloned().collect();
        assert_eq!(keys, vec!["trending".to_string()]);
    }

    #[tokio::test]
    async fn wrong_shape_is_a_miss() {
        let cache = Cache::memory();
        cache.set_json("shape", &"text", 60).await;
        assert_eq!(cache.get_json::<Vec<i32>>("shape").await, None);
    }

    #[tokio::test]
    async fn missing_url_uses_memory() {
        assert!(matches!(Cache::connect(None).await, Cache::Memory(_)));
    }
}
