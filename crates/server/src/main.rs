use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

mod app;
mod config;
mod error;
mod routes;
mod telemetry;

use app::AppState;
use config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    telemetry::init(settings.log_format)?;

    // The OCR model loads here, once, before the first request is accepted.
    let pipeline = app::build_pipeline(&settings)?;
    let router = routes::router(AppState::new(pipeline), settings.max_upload_bytes);

    serve(settings.bind, router).await
}

#[instrument(skip(router))]
async fn serve(addr: SocketAddr, router: Router) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("cardscan listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining connections");
}
