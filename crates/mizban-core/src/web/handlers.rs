//! Endpoint handlers for the transfer and admin APIs.

#![allow(clippy::missing_errors_doc)]

use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::Path as FsPath;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use axum_extra::extract::multipart::{Field, Multipart};
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use tower::util::ServiceExt;
use tower_http::services::ServeFile;
use uuid::Uuid;

use crate::error::Error;
use crate::share::{replace_file, safe_join, sanitize_filename};
use crate::{net, thumb, MAX_FILE_SIZE_LIMIT};

use super::error::{ApiError, ApiResult};
use super::AppState;

/// Slack on top of the file size limit for multipart framing overhead.
const EXTRA_MULTIPART_OVERHEAD: u64 = 10 * 1024 * 1024;

/// The loopback-only admin page, embedded at compile time.
const ADMIN_PAGE: &str = include_str!("admin.html");

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChunkInitRequest {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    chunk_size: i64,
}

#[derive(Debug, Deserialize)]
struct UploadRef {
    #[serde(default)]
    upload_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AdminSettingsUpdate {
    mizban_shared_dir: Option<String>,
    port: Option<i64>,
    parallel_chunks: Option<i64>,
    chunk_size_bytes: Option<i64>,
    max_file_size_bytes: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct QrParams {
    u: Option<String>,
}

// ============================================================================
// Listing & transfer settings
// ============================================================================

/// GET /files/ - list filenames in the shared root.
pub(super) async fn list_files(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    ensure_storage(&state)?;

    let files = state.share.list_files().map_err(|err| {
        tracing::error!(%err, "failed to list shared files");
        ApiError::internal("Failed to list files.")
    })?;

    Ok(Json(json!({ "files": files })))
}

/// GET /settings/ - transfer parameters for upload clients.
pub(super) async fn transfer_settings(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "parallel_chunks": state.settings.parallel_chunks(),
        "chunk_size_bytes": state.settings.chunk_size_bytes(),
        "max_file_size_bytes": state.settings.max_file_size_bytes(),
    }))
}

// ============================================================================
// Downloads
// ============================================================================

/// GET|HEAD /download/{rel} - serve a shared file with range support.
pub(super) async fn download(State(state): State<AppState>, request: Request) -> Response {
    if ensure_storage(&state).is_err() {
        return ApiError::internal("Storage configuration error.").into_response();
    }

    let rel = raw_path_suffix(&request, "/download/");
    if rel.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Ok(path) = state.share.join(&rel) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    serve_regular_file(&path, request).await
}

/// GET|HEAD /thumbnails/{rel} - serve the thumbnail for a shared file.
pub(super) async fn thumbnail(State(state): State<AppState>, request: Request) -> Response {
    if ensure_storage(&state).is_err() {
        return ApiError::internal("Storage configuration error.").into_response();
    }

    let rel = raw_path_suffix(&request, "/thumbnails/");
    if rel.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Ok(path) = safe_join(&state.thumb_dir, &format!("{rel}.jpg")) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    serve_regular_file(&path, request).await
}

/// The still-encoded remainder of the request path after `prefix`.
///
/// The `Path` extractor percent-decodes captures, and `safe_join` decodes as
/// well; reading the raw URI keeps the decode in exactly one place.
fn raw_path_suffix(request: &Request, prefix: &str) -> String {
    request
        .uri()
        .path()
        .strip_prefix(prefix)
        .unwrap_or_default()
        .to_string()
}

/// Serve `path` through `ServeFile`, which handles range, conditional and
/// HEAD semantics. Only regular files are exposed.
async fn serve_regular_file(path: &FsPath, request: Request) -> Response {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        _ => return StatusCode::NOT_FOUND.into_response(),
    }

    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(infallible) => match infallible {},
    }
}

// ============================================================================
// Legacy single-shot upload
// ============================================================================

/// POST /upload/ - legacy multipart upload of a single `file` part.
pub(super) async fn legacy_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    ensure_storage(&state)?;

    let max_upload = state.settings.max_file_size_bytes();
    let max_request = max_upload.saturating_add(EXTRA_MULTIPART_OVERHEAD);

    let content_length = content_length_of(&headers).filter(|len| *len > 0);
    let Some(content_length) = content_length else {
        return Err(ApiError::length_required("Missing Content-Length header."));
    };
    if content_length > max_request {
        return Err(ApiError::too_large("Upload exceeds limit."));
    }

    let mut uploaded: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Malformed multipart payload."))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let raw_name = field.file_name().unwrap_or_default().to_string();
        let clean_name = sanitize_filename(&raw_name)
            .map_err(|_| ApiError::bad_request("Invalid file name."))?;
        let destination = state
            .share
            .join(&clean_name)
            .map_err(|_| ApiError::bad_request("Invalid destination path."))?;

        let temp_token = Uuid::new_v4().simple().to_string();
        let temp_id = &temp_token[..12];
        let temp_path = state
            .share
            .root()
            .join(format!(".mizban-upload-{temp_id}-{clean_name}.tmp"));

        stream_to_temp_file(field, &temp_path, max_upload).await?;

        if let Err(err) = replace_file(&temp_path, &destination) {
            let _ = fs::remove_file(&temp_path);
            tracing::error!(%err, "failed to move uploaded file into place");
            return Err(ApiError::internal("Failed to save file."));
        }

        if let Ok(thumb_path) = safe_join(&state.thumb_dir, &format!("{clean_name}.jpg")) {
            let source = destination.clone();
            tokio::spawn(async move {
                let _ = tokio::task::spawn_blocking(move || thumb::generate(&source, &thumb_path))
                    .await;
            });
        }

        uploaded = Some(clean_name);
        break;
    }

    let Some(filename) = uploaded else {
        return Err(ApiError::bad_request("No file provided."));
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({ "filename": filename, "message": "Uploaded" })),
    ))
}

/// Stream a multipart field into `temp_path`, enforcing the size cap.
async fn stream_to_temp_file(
    mut field: Field,
    temp_path: &FsPath,
    max_bytes: u64,
) -> ApiResult<()> {
    let mut file = tokio::fs::File::create(temp_path).await.map_err(|err| {
        tracing::error!(%err, "failed to create upload temp file");
        ApiError::internal("Failed to allocate upload target.")
    })?;

    let mut written: u64 = 0;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(_) => {
                drop(file);
                let _ = tokio::fs::remove_file(temp_path).await;
                return Err(ApiError::bad_request("Malformed multipart payload."));
            }
        };

        written += chunk.len() as u64;
        if written > max_bytes {
            drop(file);
            let _ = tokio::fs::remove_file(temp_path).await;
            return Err(ApiError::too_large("Upload exceeds limit."));
        }

        if let Err(err) = file.write_all(&chunk).await {
            drop(file);
            let _ = tokio::fs::remove_file(temp_path).await;
            tracing::error!(%err, "failed to write upload temp file");
            return Err(ApiError::internal("Failed to save file."));
        }
    }

    if let Err(err) = file.flush().await {
        drop(file);
        let _ = tokio::fs::remove_file(temp_path).await;
        tracing::error!(%err, "failed to flush upload temp file");
        return Err(ApiError::internal("Failed to save file."));
    }
    Ok(())
}

// ============================================================================
// Chunked upload endpoints
// ============================================================================

/// POST /upload/chunked/init - negotiate a chunked upload session.
pub(super) async fn chunk_init(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    ensure_storage(&state)?;

    let request: ChunkInitRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::bad_request("Invalid JSON payload."))?;

    let init = state
        .uploads
        .init(&request.filename, request.size, request.chunk_size)
        .map_err(|err| match err {
            Error::InvalidUpload(_) => ApiError::from(err),
            err => {
                tracing::error!(%err, "failed to create upload session");
                ApiError::internal("Failed to create upload session.")
            }
        })?;

    Ok((StatusCode::CREATED, Json(init)))
}

/// PUT|POST /upload/chunked/chunk - submit one chunk of an upload.
pub(super) async fn chunk_write(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Json<Value>> {
    let Some(chunk_index) = u64_header(&headers, "x-chunk-index") else {
        return Err(ApiError::bad_request(
            "Missing or invalid X-Chunk-Index header.",
        ));
    };
    let Some(offset) = u64_header(&headers, "x-chunk-offset") else {
        return Err(ApiError::bad_request(
            "Missing or invalid X-Chunk-Offset header.",
        ));
    };
    let upload_id = headers
        .get("x-upload-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if upload_id.is_empty() {
        return Err(ApiError::bad_request("Missing X-Upload-ID header."));
    }
    let content_length = content_length_of(&headers);
    let Some(content_length) = content_length.filter(|len| *len > 0) else {
        return Err(ApiError::length_required("Missing Content-Length header."));
    };

    let reader = StreamReader::new(body.into_data_stream().map_err(io::Error::other));
    state
        .uploads
        .write_chunk(&upload_id, chunk_index, offset, content_length, reader)
        .await
        .map_err(|err| match err {
            Error::SessionNotFound | Error::InvalidUpload(_) => ApiError::from(err),
            err => {
                tracing::error!(%err, "chunk write failed");
                ApiError::internal("Failed to write chunk.")
            }
        })?;

    Ok(Json(json!({
        "message": "Chunk received",
        "upload_id": upload_id,
        "chunk_index": chunk_index,
    })))
}

/// POST /upload/chunked/complete - finalize a chunked upload.
pub(super) async fn chunk_complete(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: UploadRef = serde_json::from_slice(&body)
        .map_err(|_| ApiError::bad_request("Invalid JSON payload."))?;
    if request.upload_id.is_empty() {
        return Err(ApiError::bad_request("Missing upload_id."));
    }

    let filename = state
        .uploads
        .complete(&request.upload_id)
        .await
        .map_err(|err| match err {
            Error::SessionNotFound
            | Error::InvalidUpload(_)
            | Error::IncompleteUpload { .. } => ApiError::from(err),
            err => {
                tracing::error!(%err, "failed to finalize upload");
                ApiError::internal("Failed to finalize upload.")
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "filename": filename, "message": "Uploaded" })),
    ))
}

/// POST /upload/chunked/abort - abort a chunked upload.
pub(super) async fn chunk_abort(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request: UploadRef = serde_json::from_slice(&body)
        .map_err(|_| ApiError::bad_request("Invalid JSON payload."))?;
    if request.upload_id.is_empty() {
        return Err(ApiError::bad_request("Missing upload_id."));
    }

    match state.uploads.abort(&request.upload_id) {
        // An unknown id means there is nothing left to abort.
        Ok(()) | Err(Error::SessionNotFound) => {}
        Err(err) => {
            tracing::error!(%err, "failed to abort upload");
            return Err(ApiError::internal("Failed to abort upload."));
        }
    }

    Ok(Json(json!({ "message": "Aborted" })))
}

// ============================================================================
// Admin endpoints (loopback only)
// ============================================================================

/// GET /settings, /info - the loopback-only admin page.
pub(super) async fn admin_page(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> ApiResult<Html<&'static str>> {
    require_loopback(addr)?;
    Ok(Html(ADMIN_PAGE))
}

/// GET /api/admin/settings - current configuration and runtime info.
pub(super) async fn admin_settings_get(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> ApiResult<Json<Value>> {
    require_loopback(addr)?;
    Ok(Json(admin_settings_payload(&state)))
}

/// PUT /api/admin/settings - validate and apply a configuration update.
pub(super) async fn admin_settings_update(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    require_loopback(addr)?;

    let request: AdminSettingsUpdate = serde_json::from_slice(&body)
        .map_err(|_| ApiError::bad_request("Invalid JSON payload."))?;

    let mut restart_required = false;
    let mut changes: Vec<&'static str> = Vec::with_capacity(5);

    if let Some(shared_dir) = request.mizban_shared_dir.as_deref() {
        let shared_dir = shared_dir.trim();
        if shared_dir.is_empty() {
            return Err(ApiError::bad_request("mizban_shared_dir cannot be empty."));
        }
        let abs_shared_dir = std::path::absolute(shared_dir)
            .map_err(|_| ApiError::bad_request("mizban_shared_dir is invalid."))?;
        if fs::create_dir_all(&abs_shared_dir).is_err() {
            return Err(ApiError::bad_request("Unable to access shared folder path."));
        }

        if abs_shared_dir != state.share.root() {
            // Relocate upload sessions first: in-flight temp files live under
            // the old root and are aborted by contract.
            if let Err(err) = state
                .uploads
                .update_storage(&abs_shared_dir, &state.thumb_dir)
            {
                tracing::error!(%err, "failed to apply shared folder change");
                return Err(ApiError::internal("Failed to apply shared folder."));
            }
            state.share.set_root(&abs_shared_dir);
            state.settings.set_shared_dir(&abs_shared_dir);
            changes.push("mizban_shared_dir");
        }
    }

    if let Some(port) = request.port {
        if !(1..=65535).contains(&port) {
            return Err(ApiError::bad_request("port must be between 1 and 65535."));
        }
        let port = port as u16;
        if port != state.settings.port() {
            state.settings.set_port(port);
            restart_required = true;
            changes.push("port");
        }
    }

    if let Some(parallel_chunks) = request.parallel_chunks {
        if !(1..=64).contains(&parallel_chunks) {
            return Err(ApiError::bad_request(
                "parallel_chunks must be between 1 and 64.",
            ));
        }
        let parallel_chunks = parallel_chunks as u64;
        if parallel_chunks != state.settings.parallel_chunks() {
            state.settings.set_parallel_chunks(parallel_chunks);
            changes.push("parallel_chunks");
        }
    }

    if let Some(chunk_size) = request.chunk_size_bytes {
        if !(262_144..=67_108_864).contains(&chunk_size) {
            return Err(ApiError::bad_request(
                "chunk_size_bytes must be between 262144 and 67108864.",
            ));
        }
        let chunk_size = chunk_size as u64;
        if chunk_size != state.settings.chunk_size_bytes() {
            state.settings.set_chunk_size_bytes(chunk_size);
            changes.push("chunk_size_bytes");
        }
    }

    if let Some(max_file_size) = request.max_file_size_bytes {
        if max_file_size <= 0 || max_file_size as u64 > MAX_FILE_SIZE_LIMIT {
            return Err(ApiError::bad_request(
                "max_file_size_bytes must be between 1 and 107374182400.",
            ));
        }
        let max_file_size = max_file_size as u64;
        if max_file_size != state.settings.max_file_size_bytes() {
            state.settings.set_max_file_size_bytes(max_file_size);
            changes.push("max_file_size_bytes");
        }
    }

    state.uploads.update_limits(
        state.settings.max_file_size_bytes(),
        state.settings.chunk_size_bytes(),
    );

    if let Err(err) = state.settings.save() {
        tracing::error!(%err, "failed to persist settings");
        return Err(ApiError::internal("Failed to persist settings."));
    }

    if state.settings.port() != state.active_port {
        restart_required = true;
    }

    let mut response = admin_settings_payload(&state);
    response["changes"] = json!(changes);
    response["restart_required"] = json!(restart_required);
    Ok(Json(response))
}

/// GET /api/admin/qr.png - QR image for the LAN URL (or an explicit `u=`).
pub(super) async fn admin_qr(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<QrParams>,
) -> ApiResult<Response> {
    require_loopback(addr)?;

    let url = params
        .u
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| net::server_url(state.settings.port()));

    let png = crate::qr::generate_png(&url, 256).map_err(|err| {
        tracing::error!(%err, "failed to render QR code");
        ApiError::internal("Failed to generate QR.")
    })?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// POST /api/admin/restart - schedule a process restart.
pub(super) async fn admin_restart(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> ApiResult<impl IntoResponse> {
    require_loopback(addr)?;

    let Some(restart) = state.restart.as_ref() else {
        return Err(ApiError::not_implemented(
            "Restart is not available in this runtime.",
        ));
    };

    if !restart() {
        return Err(ApiError::conflict("Restart already in progress."));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Restart scheduled." })),
    ))
}

// ============================================================================
// Helpers
// ============================================================================

fn admin_settings_payload(state: &AppState) -> Value {
    let configured_port = state.settings.port();
    let active_port = state.active_port;
    json!({
        "settings": {
            "mizban_shared_dir": state.share.root().display().to_string(),
            "port": configured_port,
            "parallel_chunks": state.settings.parallel_chunks(),
            "chunk_size_bytes": state.settings.chunk_size_bytes(),
            "max_file_size_bytes": state.settings.max_file_size_bytes(),
        },
        "runtime": {
            "lan_url": net::server_url(active_port),
            "admin_url": net::admin_url(active_port),
            "active_port": active_port,
            "port_change_pending": configured_port != active_port,
            "restart_supported": state.restart.is_some(),
            "loopback_only": true,
        },
    })
}

fn ensure_storage(state: &AppState) -> ApiResult<()> {
    let result = state
        .share
        .ensure()
        .and_then(|()| fs::create_dir_all(&state.thumb_dir));
    result.map_err(|err| {
        tracing::error!(%err, "storage directories unavailable");
        ApiError::internal("Storage configuration error.")
    })
}

fn require_loopback(addr: SocketAddr) -> ApiResult<()> {
    if addr.ip().is_loopback() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Forbidden: local access only."))
    }
}

fn content_length_of(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

fn u64_header(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}
