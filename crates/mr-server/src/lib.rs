//! mr-server: the HTTP face of mediarelay.
//!
//! - axum router with the stream, health, and metrics routes
//! - [`AppContext`](context::AppContext) holding the stream service, the
//!   catalog, and the metrics handle
//! - response assembly and error classification for the stream route
//! - graceful shutdown via signal handling

pub mod catalog;
pub mod context;
pub mod error;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use mr_core::config::Config;
use mr_core::{Error, Result};
use mr_upstream::StreamService;
use tokio::net::TcpListener;

use crate::context::AppContext;

/// Start the mediarelay server.
///
/// Builds the [`AppContext`] from `config`, binds the configured address, and
/// serves until a shutdown signal arrives.
pub async fn start(config: Config) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let streams = StreamService::from_config(&config)?;
    let catalog = catalog::from_config(&config.catalog)?;
    let metrics = routes::metrics::install_recorder();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(config, streams, catalog).with_metrics(metrics);
    let app = router::build_router(ctx);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Starting server on {addr}");
    serve(listener, app, shutdown_signal()).await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Serve `app` on `listener` until `shutdown` completes.
///
/// Peer addresses are made available to handlers as `ConnectInfo`.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
}
