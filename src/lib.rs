pub mod api;
pub mod app_state;
pub mod config;
pub mod downloader;

use anyhow::Context;
use axum::Router;
use axum::extract::Extension;
use axum::routing::post;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

//
// Re-export
//
pub use api::{ApiError, DOWNLOAD_ROUTE, download_video, fallback};
pub use app_state::AppState;
pub use config::Config;
pub use downloader::{DownloadError, Downloader, DownloaderConfig};

/// Build the router: the download endpoint, with every other request
/// handled by `fallback`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route(DOWNLOAD_ROUTE, post(download_video).fallback(fallback))
        .fallback(fallback)
        .layer(axum::middleware::from_fn(api::log_request_errors))
        .layer(axum::middleware::from_fn(api::cross_origin_headers))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = AppState::new(&config)?;
    let addr = config.socket_addr()?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(
        static_dir = %state.static_dir().display(),
        "Server running at http://localhost:{}",
        config.listen_on_port
    );

    serve(listener, state, shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
