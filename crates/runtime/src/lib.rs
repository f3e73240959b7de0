use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};
use wellzo_auth::{Authenticator, Mailer};
use wellzo_config::AppConfig;
use wellzo_database::initialize_database;
use wellzo_social::{Cache, CacheTtls, SocialService};
use wellzo_wearables::{default_transport, WearableService};

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Install the global fmt subscriber. `RUST_LOG` overrides the
    /// default `info` filter.
    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
    pub social: SocialService,
    pub wearables: WearableService,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        if config.auth.uses_default_secret() {
            warn!("auth.jwt_secret is the built-in development value; set WELLZO__AUTH__JWT_SECRET");
        }
        let db_pool = initialize_database(&config.database).await?;

        let mailer = Mailer::from_config(&config.email).context("failed to configure mailer")?;
        let authenticator = Authenticator::new(db_pool.clone(), &config.auth, &config.otp, mailer)
            .context("failed to build authenticator")?;

        let cache = Cache::connect(config.cache.redis_url.as_deref()).await;
        let social = SocialService::new(db_pool.clone(), cache, CacheTtls::from(&config.cache));

        let transport = default_transport().await;
        let wearables = WearableService::new(db_pool.clone(), transport, &config.wearables);

        info!(
            google = authenticator.google_enabled(),
            email = config.email.enabled,
            "backend services ready"
        );

        Ok(Self {
            db_pool,
            authenticator,
            social,
            wearables,
        })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
