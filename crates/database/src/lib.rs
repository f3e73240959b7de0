//! Database plumbing for the Wellzo backend: the SQLite pool, the embedded
//! schema migrations and the timestamp format every table shares.

use anyhow::Result;
use sqlx::SqlitePool;
use wellzo_config::DatabaseConfig;

pub mod connection;
pub mod migrations;
pub mod time;
pub mod transaction;

pub use connection::{prepare_database, DatabaseConnection};
pub use migrations::{run_migrations, MIGRATOR};
pub use time::{format_timestamp, now_timestamp, parse_timestamp};
pub use transaction::WriteTransaction;

/// Open the pool and bring the schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<SqlitePool> {
    let pool = prepare_database(config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_database() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested/test.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 2,
        };

        let pool = initialize_database(&config).await.unwrap();
        (pool, temp_dir)
    }

    #[tokio::test]
    async fn initialization_creates_schema() {
        let (pool, _temp_dir) = create_test_database().await;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in ["users", "user_sessions", "posts", "reactions", "follows", "wearable_data"] {
            assert!(tables.iter().any(|name| name == expected), "missing table {expected}");
        }
    }

    #[tokio::test]
    async fn foreign_keys_enabled_on_every_connection() {
        let (pool, _temp_dir) = create_test_database().await;

        let mut first = pool.acquire().await.unwrap();
        let mut second = pool.acquire().await.unwrap();

        let a: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&mut *first)
            .await
            .unwrap();
        let b: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&mut *second)
            .await
            .unwrap();

        assert_eq!((a, b), (1, 1));
    }
}
