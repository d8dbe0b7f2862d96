//! Built-in static origin.
//!
//! Serves the publish directory on the app port when no framework dev
//! server is running. Sits behind the routing proxy like any app origin, so
//! its 404s still drive alternative-path retries and rule fallbacks.

use std::path::Path;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::services::{ServeDir, ServeFile};

use crate::http::response::NOT_FOUND_PAGE;

pub fn router(publish_dir: &Path) -> Router {
    let files = ServeDir::new(publish_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(publish_dir.join(NOT_FOUND_PAGE)));
    Router::new().fallback_service(files)
}

pub async fn serve(
    listener: TcpListener,
    publish_dir: &Path,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    tracing::info!(
        address = %listener.local_addr()?,
        dir = ?publish_dir,
        "Static origin starting"
    );
    axum::serve(listener, router(publish_dir))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
