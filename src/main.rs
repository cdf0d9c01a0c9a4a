//! Train Station API
//! Mission: Serve station, account and complaint endpoints over HTTP

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, time::interval};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use train_station_api::{
    auth::mailer::{self, Mailer},
    build_router, AppConfig, AppState,
};

const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = AppConfig::parse();
    info!(
        "Starting train station API ({:?}) on {}",
        config.environment, config.bind_addr
    );

    let mailer: Arc<dyn Mailer> =
        Arc::from(mailer::from_config(&config.mail).context("Failed to configure mailer")?);

    let state = AppState::new(config, mailer)?;

    if let Some((email, password)) = state.config.admin.credentials() {
        state
            .users
            .ensure_admin(&state.config.admin.name, email, password)
            .context("Failed to bootstrap admin account")?;
    }

    let limiter = state.limiter.clone();
    tokio::spawn(async move {
        let mut ticker = interval(LIMITER_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            limiter.cleanup();
        }
    });

    let bind_addr = state.config.bind_addr.clone();
    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("API server listening on {}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "train_station_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // Also the crate root, for runs from another directory
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
