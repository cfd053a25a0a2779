//! Runtime wiring: one running Mizban HTTP server.
//!
//! [`Runtime::new`] assembles the share manager, upload session manager,
//! listener and router; [`Runtime::run`] serves until the provided shutdown
//! future resolves, a restart is requested through the admin API, or the
//! server fails. Shutdown is graceful with a bounded grace period, and the
//! upload manager is always closed on the way out.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

use crate::config::Settings;
use crate::error::Result;
use crate::net;
use crate::share::ShareManager;
use crate::uploads::UploadManager;
use crate::web::{self, AppState, RestartAction};

/// How long in-flight requests get to finish after a shutdown is triggered.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Why [`Runtime::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The shutdown future resolved (signal, caller decision).
    Shutdown,
    /// A restart was requested through the admin API.
    Restart,
}

/// A fully wired, not-yet-serving Mizban server.
pub struct Runtime {
    settings: Arc<Settings>,
    share: Arc<ShareManager>,
    uploads: UploadManager,
    listener: TcpListener,
    router: Router,
    bound_port: u16,
    restart_rx: mpsc::Receiver<()>,
    web_dir: PathBuf,
    thumb_dir: PathBuf,
}

impl Runtime {
    /// Build a runtime from settings, serving static assets out of `web_dir`.
    ///
    /// Ensures the shared root and thumbnail directory exist, binds the
    /// listener (retrying past occupied ports), and persists the bound port
    /// back to the settings when it differs from the configured one.
    ///
    /// # Errors
    ///
    /// Returns an error when storage directories cannot be created or no
    /// port can be bound.
    pub async fn new(settings: Arc<Settings>, web_dir: impl Into<PathBuf>) -> Result<Self> {
        let web_dir = web_dir.into();

        let share = Arc::new(ShareManager::new(settings.shared_dir()));
        share.ensure()?;
        let thumb_dir = settings.thumbnail_dir();
        std::fs::create_dir_all(&thumb_dir)?;

        let uploads = UploadManager::new(
            share.root(),
            thumb_dir.clone(),
            settings.max_file_size_bytes(),
            settings.chunk_size_bytes(),
        );

        let (listener, bound_port) = match net::bind_with_retry(settings.host(), settings.port()) {
            Ok(bound) => bound,
            Err(err) => {
                uploads.close().await;
                return Err(err);
            }
        };
        if bound_port != settings.port() {
            tracing::info!(
                configured = settings.port(),
                bound = bound_port,
                "configured port unavailable, persisting the bound one"
            );
            settings.set_port(bound_port);
            if let Err(err) = settings.save() {
                tracing::warn!(%err, "failed to persist auto-selected port");
            }
        }

        let (restart_tx, restart_rx) = mpsc::channel(1);
        let state = AppState {
            settings: Arc::clone(&settings),
            share: Arc::clone(&share),
            uploads: uploads.clone(),
            thumb_dir: thumb_dir.clone(),
            active_port: bound_port,
            restart: Some(one_shot_restart(restart_tx)),
        };
        let router = web::router(state, &web_dir);

        Ok(Self {
            settings,
            share,
            uploads,
            listener,
            router,
            bound_port,
            restart_rx,
            web_dir,
            thumb_dir,
        })
    }

    /// Port the listener is bound to.
    pub fn port(&self) -> u16 {
        self.bound_port
    }

    /// URL LAN clients should open.
    pub fn url(&self) -> String {
        net::server_url(self.bound_port)
    }

    /// Loopback-only admin page URL.
    pub fn admin_url(&self) -> String {
        net::admin_url(self.bound_port)
    }

    /// Current shared directory.
    pub fn share_dir(&self) -> PathBuf {
        self.share.root()
    }

    /// Directory thumbnails are stored in.
    pub fn thumbnail_dir(&self) -> &Path {
        &self.thumb_dir
    }

    /// Directory static assets are served from.
    pub fn web_dir(&self) -> &Path {
        &self.web_dir
    }

    /// Settings store this runtime was built from.
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Serve until `shutdown` resolves, a restart is requested, or the
    /// server fails. In-flight requests get [`SHUTDOWN_GRACE`] to finish
    /// before connections are aborted; the upload manager is closed in every
    /// exit path.
    ///
    /// # Errors
    ///
    /// Returns the underlying server error if serving fails.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send) -> Result<ExitReason> {
        let Self {
            uploads,
            listener,
            router,
            mut restart_rx,
            ..
        } = self;

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = stop_rx.changed().await;
        });

        let mut server_task = tokio::spawn(server.into_future());
        tokio::pin!(shutdown);

        let reason = tokio::select! {
            result = &mut server_task => {
                uploads.close().await;
                return match result {
                    Ok(Ok(())) => Ok(ExitReason::Shutdown),
                    Ok(Err(err)) => Err(err.into()),
                    Err(err) => Err(crate::Error::Internal(format!("server task failed: {err}"))),
                };
            }
            () = &mut shutdown => ExitReason::Shutdown,
            _ = restart_rx.recv() => ExitReason::Restart,
        };

        let _ = stop_tx.send(true);
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut server_task)
            .await
            .is_err()
        {
            tracing::warn!("graceful shutdown timed out, aborting open connections");
            server_task.abort();
        }

        uploads.close().await;
        tracing::info!(?reason, "server stopped");
        Ok(reason)
    }
}

/// Build the admin restart action: at most one successful trigger per
/// process lifetime, established by a compare-and-swap before the
/// non-blocking send into the 1-buffered restart channel.
fn one_shot_restart(restart_tx: mpsc::Sender<()>) -> RestartAction {
    let requested = Arc::new(AtomicBool::new(false));
    Arc::new(move || {
        if requested
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        if restart_tx.try_send(()).is_ok() {
            true
        } else {
            requested.store(false, Ordering::SeqCst);
            false
        }
    })
}
