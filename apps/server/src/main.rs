use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};
use utoipa::OpenApi;
use wellzo_api::{build_router, ApiDoc, AppState};
use wellzo_config::load as load_config;
use wellzo_runtime::{telemetry, BackendServices};

const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Parser)]
#[command(name = "wellzo-server")]
#[command(about = "Wellzo wellness backend (serves HTTP by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Close every session past its expiry and exit
    PruneSessions,
    /// Print the OpenAPI document as JSON
    Openapi,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::PruneSessions => prune_sessions().await,
        Commands::Openapi => print_openapi(),
    }
}

fn app_state(services: &BackendServices) -> AppState {
    AppState::new(
        services.authenticator.clone(),
        services.social.clone(),
        services.wearables.clone(),
    )
}

async fn run_server() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting Wellzo backend");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let pruner = tokio::spawn(prune_periodically(services.clone()));
    let app = build_router(app_state(&services));

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wellzo_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    pruner.abort();
    services.db_pool.close().await;
    info!("backend shut down");
    Ok(())
}

async fn prune_periodically(services: BackendServices) {
    let mut ticker = tokio::time::interval(SESSION_PRUNE_INTERVAL);
    loop {
        ticker.tick().await;
        match services.authenticator.prune_expired_sessions().await {
            Ok(0) => {}
            Ok(closed) => info!(closed, "expired sessions closed"),
            Err(error) => warn!(%error, "failed to prune expired sessions"),
        }
    }
}

async fn prune_sessions() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let closed = services
        .authenticator
        .prune_expired_sessions()
        .await
        .context("failed to prune expired sessions")?;
    println!("Closed {closed} expired session(s)");
    Ok(())
}

fn print_openapi() -> anyhow::Result<()> {
    let document = ApiDoc::openapi()
        .to_pretty_json()
        .context("failed to render OpenAPI document")?;
    println!("{document}");
    Ok(())
}
