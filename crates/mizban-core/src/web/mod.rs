//! HTTP surface of the Mizban server.
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | /files/ | List filenames in the shared root |
//! | GET | /settings/ | Transfer parameters for upload clients |
//! | GET/HEAD | /download/{name} | Download with range support |
//! | GET/HEAD | /thumbnails/{name} | Thumbnail for a shared file |
//! | POST | /upload/ | Legacy single-shot multipart upload |
//! | POST | /upload/chunked/init | Negotiate a chunked upload session |
//! | PUT/POST | /upload/chunked/chunk | Submit one chunk |
//! | POST | /upload/chunked/complete | Finalize a chunked upload |
//! | POST | /upload/chunked/abort | Abort a chunked upload |
//! | GET/PUT | /api/admin/settings | Read/update configuration (loopback) |
//! | GET | /api/admin/qr.png | QR image of the LAN URL (loopback) |
//! | POST | /api/admin/restart | Schedule a server restart (loopback) |
//! | GET | /settings, /info | Admin HTML page (loopback) |
//!
//! Everything else falls through to the static file handler serving the
//! front-end directory. Admin routes are restricted to loopback callers via
//! the connection's remote address.

pub mod assets;
mod error;
mod handlers;

pub use error::{ApiError, ApiResult};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::services::ServeDir;

use crate::config::Settings;
use crate::share::ShareManager;
use crate::uploads::UploadManager;

/// JSON request bodies are capped at 1 MiB.
const JSON_BODY_LIMIT: usize = 1 << 20;

/// Action invoked by `POST /api/admin/restart`; returns whether the restart
/// was newly scheduled.
pub type RestartAction = Arc<dyn Fn() -> bool + Send + Sync>;

/// Shared state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Persistent configuration store.
    pub settings: Arc<Settings>,
    /// Shared-root manager.
    pub share: Arc<ShareManager>,
    /// Chunked upload session manager.
    pub uploads: UploadManager,
    /// Directory thumbnails are served from.
    pub thumb_dir: PathBuf,
    /// Port the listener is actually bound to.
    pub active_port: u16,
    /// Restart trigger wired by the runtime, if any.
    pub restart: Option<RestartAction>,
}

/// Build the full Mizban router over `state`, with static assets served
/// from `web_dir`.
pub fn router(state: AppState, web_dir: &Path) -> Router {
    Router::new()
        .route("/files/", get(handlers::list_files))
        .route("/settings/", get(handlers::transfer_settings))
        .route("/settings", get(handlers::admin_page))
        .route("/info", get(handlers::admin_page))
        .route("/info/", get(handlers::admin_page))
        .route(
            "/api/admin/settings",
            get(handlers::admin_settings_get)
                .put(handlers::admin_settings_update)
                .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT)),
        )
        .route("/api/admin/qr.png", get(handlers::admin_qr))
        .route("/api/admin/restart", post(handlers::admin_restart))
        .route(
            "/upload/chunked/init",
            post(handlers::chunk_init).layer(DefaultBodyLimit::max(JSON_BODY_LIMIT)),
        )
        .route(
            "/upload/chunked/chunk",
            put(handlers::chunk_write)
                .post(handlers::chunk_write)
                .layer(DefaultBodyLimit::disable()),
        )
        .route(
            "/upload/chunked/complete",
            post(handlers::chunk_complete).layer(DefaultBodyLimit::max(JSON_BODY_LIMIT)),
        )
        .route(
            "/upload/chunked/abort",
            post(handlers::chunk_abort).layer(DefaultBodyLimit::max(JSON_BODY_LIMIT)),
        )
        .route(
            "/upload/",
            post(handlers::legacy_upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/download/{*rel}", get(handlers::download))
        .route("/thumbnails/{*rel}", get(handlers::thumbnail))
        .fallback_service(ServeDir::new(web_dir))
        .with_state(state)
}
