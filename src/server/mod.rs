//! HTTP API over the media service.

mod error;
mod routes;
mod schemas;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::service::MediaService;

pub use error::ApiError;
pub use schemas::{EditRequest, HealthResponse, ImageRequest, MediaQuery};

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Shared router state.
pub type AppState = Arc<MediaService>;

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/generate/image", post(routes::generate_image))
        .route("/api/generate/video", post(routes::generate_video))
        .route("/api/edit/video", post(routes::edit_video))
        .route("/api/workflow/complete", post(routes::complete_workflow))
        .route("/api/generators", get(routes::generators))
        .route(
            "/api/upload",
            post(routes::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/media/list", get(routes::list_media))
        .route("/api/media/download/{*path}", get(routes::download_media))
        .route("/uploads/{*path}", get(routes::uploads))
        .with_state(service)
}

/// Bind `host:port`, where `host` may be an IP address or a hostname.
pub async fn bind(host: &str, port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind((host, port)).await
}

/// Serve on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, service: AppState) -> std::io::Result<()> {
    log::info!("Listening on http://{}", listener.local_addr()?);
    log::info!("Content directory: {}", service.store());

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Shutting down");
            }
        })
        .await
}
