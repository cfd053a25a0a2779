//! Shared helpers for Mizban integration tests.

#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::connect_info::ConnectInfo;
use axum::http::{Method, Request};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::util::ServiceExt;

use mizban_core::config::Settings;
use mizban_core::share::ShareManager;
use mizban_core::uploads::UploadManager;
use mizban_core::web::{self, AppState, RestartAction};

/// A loopback caller, allowed on admin routes.
pub const LOOPBACK_ADDR: &str = "127.0.0.1:5050";

/// A LAN caller, rejected on admin routes.
pub const REMOTE_ADDR: &str = "192.168.1.25:4040";

/// A fully wired router plus the state behind it, rooted in a temp home.
pub struct TestServer {
    pub home: TempDir,
    pub shared_dir: PathBuf,
    pub state: AppState,
    pub router: Router,
}

/// Build a test server without a restart action.
pub fn test_server() -> TestServer {
    test_server_with_restart(None)
}

/// Build a test server with an explicit restart action.
pub fn test_server_with_restart(restart: Option<RestartAction>) -> TestServer {
    let home = TempDir::new().expect("create temp home");
    let settings = Arc::new(Settings::for_home(home.path()).expect("settings init"));

    let shared_dir = settings.shared_dir();
    fs::create_dir_all(&shared_dir).expect("create shared dir");
    let thumb_dir = settings.thumbnail_dir();
    fs::create_dir_all(&thumb_dir).expect("create thumbnail dir");

    let web_dir = home.path().join("web");
    fs::create_dir_all(&web_dir).expect("create web dir");
    fs::write(web_dir.join("index.html"), "ok").expect("write web index");

    let share = Arc::new(ShareManager::new(&shared_dir));
    let uploads = UploadManager::new(
        &shared_dir,
        &thumb_dir,
        settings.max_file_size_bytes(),
        settings.chunk_size_bytes(),
    );

    let state = AppState {
        settings: Arc::clone(&settings),
        share,
        uploads,
        thumb_dir,
        active_port: settings.port(),
        restart,
    };
    let router = web::router(state.clone(), &web_dir);

    TestServer {
        home,
        shared_dir,
        state,
        router,
    }
}

/// Build a request carrying the given remote address.
pub fn request(method: Method, uri: &str, remote: &str, body: Body) -> Request<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body)
        .expect("build request");
    let addr: SocketAddr = remote.parse().expect("parse remote addr");
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// Drive one request through the router.
pub async fn send(server: &TestServer, request: Request<Body>) -> axum::response::Response {
    server
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router oneshot")
}

/// Collect a response body as bytes.
pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("collect body")
        .to_vec()
}

/// Collect a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("parse JSON body")
}

/// Deterministic, non-repeating content for transfer tests.
pub fn pattern_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
