use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use alpha_faucet::config::{Cli, Config};
use alpha_faucet::routes;
use alpha_faucet::state::AppState;
use alpha_faucet::store::BalanceStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("alpha_faucet={},tower_http=info", cli.log_level).into()),
        )
        .init();

    let config = Config::from(cli);

    tracing::info!(database = %config.database_path.display(), "opening balance store");
    let store = BalanceStore::open(&config.database_path)
        .with_context(|| format!("failed to open store at {}", config.database_path.display()))?;

    let meta = store.get_snapshot_meta()?;
    match &meta {
        Some(m) => tracing::info!(
            block = m.block_height,
            addresses = m.address_count,
            "loaded snapshot"
        ),
        None => tracing::warn!(
            "no snapshot metadata found — every balance lookup will 404 until one is loaded"
        ),
    }

    let state = Arc::new(AppState::new(&config, store));
    let cors = build_cors(&config.cors_origin)?;
    let app = routes::api_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn build_cors(origin: &str) -> Result<CorsLayer> {
    if origin == "*" {
        return Ok(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));
    }
    let origin = origin
        .parse::<axum::http::HeaderValue>()
        .with_context(|| format!("invalid CORS_ORIGIN: {origin}"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining in-flight claims");
}
