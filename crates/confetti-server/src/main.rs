mod config;
mod sweeper;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use confetti_api::{AppState, AppStateInner};
use confetti_db::Database;
use confetti_gateway::dispatcher::Dispatcher;
use confetti_storage::{PhotoStore, UrlSigner};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confetti=debug,confetti_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database and blob storage
    let db = Arc::new(Database::open(&config.db_path)?);
    let store = PhotoStore::new(config.media_dir.clone()).await?;
    let signer = UrlSigner::new(
        config.jwt_secret.as_bytes(),
        config.public_url.as_str(),
        config.signed_url_ttl_secs,
    )?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        store,
        signer,
        dispatcher: Dispatcher::new(),
        jwt_secret: config.jwt_secret.clone(),
        default_guest_quota: config.guest_quota,
        max_upload_bytes: config.max_upload_bytes,
    });

    tokio::spawn(sweeper::run_sweep_loop(
        state.clone(),
        config.sweep_interval_secs,
    ));

    let app = confetti_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Confetti server listening on {}", addr);
    info!(
        "Guest quota {}, uploads up to {} bytes, media in {}",
        config.guest_quota,
        config.max_upload_bytes,
        config.media_dir.display()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
