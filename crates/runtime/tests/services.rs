use std::path::Path;

use anyhow::{Context, Result};
use tempfile::TempDir;
use wellzo_config::AppConfig;
use wellzo_runtime::BackendServices;
use wellzo_social::Cache;

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy())
}

fn build_config(database_url: String, max_connections: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = database_url;
    config.database.max_connections = max_connections;
    config.cache.redis_url = None;
    config.email.enabled = false;
    config
}

async fn initialise(config: &AppConfig) -> Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_runs_migrations() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/init.db");
    let config = build_config(sqlite_url(&db_path), 4);

    let services = initialise(&config).await?;
    for table in ["users", "posts", "wearable_data"] {
        let found: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_optional(&services.db_pool)
        .await?;
        assert_eq!(Some(table.to_string()), found);
    }
    assert!(db_path.exists(), "sqlite file should be created");
    assert_eq!(4, services.db_pool.options().get_max_connections());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_enables_foreign_keys() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("fk.db")), 2);

    let services = initialise(&config).await?;
    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&services.db_pool)
        .await?;
    assert_eq!(1, enabled, "foreign key enforcement must be enabled");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_redis_falls_back_to_memory_cache() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("cache.db")), 1);

    let services = initialise(&config).await?;
    assert!(matches!(services.social.cache(), Cache::Memory(_)));
    Ok(())
}

#[cfg(not(feature = "bluetooth"))]
#[tokio::test(flavor = "multi_thread")]
async fn default_build_reports_bluetooth_unavailable() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = build_config(sqlite_url(&temp_dir.path().join("ble.db")), 1);

    let services = initialise(&config).await?;
    let error = services
        .wearables
        .scan()
        .await
        .err()
        .context("scan should fail without bluetooth support")?;
    assert!(error.is_unavailable());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn enabled_email_with_bad_sender_fails_fast() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut config = build_config(sqlite_url(&temp_dir.path().join("mail.db")), 1);
    config.email.enabled = true;
    config.email.smtp_host = "localhost".into();
    config.email.from_email = "not an address".into();

    let error = match BackendServices::initialise(&config).await {
        Ok(_) => anyhow::bail!("expected mailer configuration to fail"),
        Err(error) => error,
    };
    assert!(format!("{error:?}").contains("failed to configure mailer"));
    Ok(())
}
