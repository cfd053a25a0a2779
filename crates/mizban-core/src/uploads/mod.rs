//! Chunked upload session management - the concurrency core of Mizban.
//!
//! A client negotiates an upload with [`UploadManager::init`], which
//! pre-allocates a hidden temp file of the final size inside the shared root.
//! Chunks then arrive in any order over any number of parallel connections;
//! each one is validated against the negotiated geometry and written at its
//! fixed offset, so the temp file itself is the reassembly buffer and no
//! ordering state is needed. [`UploadManager::complete`] fsyncs the file and
//! atomically renames it over the destination. Abandoned sessions are reaped
//! by a background sweeper.
//!
//! ## Locking
//!
//! Two levels, always acquired registry-first and never held across I/O:
//!
//! - the registry lock guards the id -> session map plus the manager-wide
//!   configuration (root, thumbnail dir, limits);
//! - each session has its own mutex guarding the per-chunk state machine
//!   (`Pending -> Writing -> Complete`), which is what makes duplicate chunk
//!   submissions idempotent and concurrent writers of the same chunk
//!   impossible.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::share::{replace_file, safe_join, sanitize_filename};
use crate::thumb;
use crate::{
    DEFAULT_CHUNK_SIZE_BYTES, MAX_CHUNK_SIZE_BYTES, MAX_FILE_SIZE_LIMIT, MIN_CHUNK_SIZE_BYTES,
};

/// Buffer size used while streaming chunk bodies to disk.
const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// How long an idle session survives between chunk writes.
const SESSION_TTL: Duration = Duration::from_secs(90 * 60);

/// Sweeper cadence.
const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Pending,
    Writing,
    Complete,
}

struct SessionState {
    chunk_states: Vec<ChunkState>,
    received_count: usize,
    completed: bool,
    last_seen: Instant,
    /// Taken (and thereby closed) during finalization or cleanup.
    file: Option<Arc<File>>,
}

struct UploadSession {
    id: String,
    filename: String,
    temp_path: PathBuf,
    final_path: PathBuf,
    size: u64,
    chunk_size: u64,
    total_chunks: usize,
    #[allow(dead_code)]
    created_at: Instant,
    state: Mutex<SessionState>,
}

impl UploadSession {
    fn expected_chunk_size(&self, index: usize) -> u64 {
        let start = index as u64 * self.chunk_size;
        (self.size - start).min(self.chunk_size)
    }
}

/// Parameters negotiated by [`UploadManager::init`], echoed back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct UploadInit {
    /// Session identifier, 32 hex characters from a cryptographic RNG
    pub upload_id: String,
    /// Sanitized destination filename
    pub filename: String,
    /// Total file size in bytes
    pub size: u64,
    /// Negotiated (clamped) chunk size in bytes
    pub chunk_size: u64,
    /// Number of chunks the client must deliver
    pub total_chunks: u64,
}

struct Registry {
    root: PathBuf,
    thumb_dir: PathBuf,
    max_file: u64,
    chunk_size: u64,
    session_ttl: Duration,
    sessions: HashMap<String, Arc<UploadSession>>,
}

struct Inner {
    registry: RwLock<Registry>,
    sweeper_stop: watch::Sender<bool>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

/// Coordinates parallel chunked uploads into pre-sized temp files.
///
/// Cheap to clone; all clones share the same session registry. Must be
/// created inside a tokio runtime (the stale-session sweeper is spawned at
/// construction).
#[derive(Clone)]
pub struct UploadManager {
    inner: Arc<Inner>,
}

impl UploadManager {
    /// Create a manager rooted at `root`, writing thumbnails to `thumb_dir`.
    ///
    /// `max_file_size` and `default_chunk_size` are clamped to the supported
    /// ranges; `0` selects the defaults.
    pub fn new(
        root: impl Into<PathBuf>,
        thumb_dir: impl Into<PathBuf>,
        max_file_size: u64,
        default_chunk_size: u64,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let inner = Arc::new(Inner {
            registry: RwLock::new(Registry {
                root: root.into(),
                thumb_dir: thumb_dir.into(),
                max_file: clamp_max_file(max_file_size),
                chunk_size: clamp_chunk_size(default_chunk_size),
                session_ttl: SESSION_TTL,
                sessions: HashMap::new(),
            }),
            sweeper_stop: stop_tx,
            sweeper: Mutex::new(None),
        });

        let handle = tokio::spawn(sweep_loop(Arc::clone(&inner), stop_rx));
        *inner.sweeper.lock() = Some(handle);

        Self { inner }
    }

    /// Stop the sweeper and abort every remaining session.
    pub async fn close(&self) {
        let _ = self.inner.sweeper_stop.send(true);
        let handle = self.inner.sweeper.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let sessions: Vec<_> = {
            let mut registry = self.inner.registry.write();
            registry.sessions.drain().map(|(_, s)| s).collect()
        };
        for session in &sessions {
            cleanup_session(session);
        }
    }

    /// Start a new chunked upload session.
    ///
    /// Validates the filename, size and chunk geometry, creates the pre-sized
    /// temp file with exclusive-create semantics, and registers the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUpload`] for any validation failure; temp file
    /// creation failures propagate as I/O errors and leave nothing behind.
    pub fn init(&self, filename: &str, size: i64, chunk_size: i64) -> Result<UploadInit> {
        let (root, max_file, default_chunk_size) = {
            let registry = self.inner.registry.read();
            (registry.root.clone(), registry.max_file, registry.chunk_size)
        };

        let name = sanitize_filename(filename)
            .map_err(|_| Error::InvalidUpload("invalid filename".to_string()))?;
        if size <= 0 || size as u64 > max_file {
            return Err(Error::InvalidUpload("file size out of bounds".to_string()));
        }
        let size = size as u64;
        let chunk_size = if chunk_size <= 0 {
            default_chunk_size
        } else {
            clamp_chunk_size(chunk_size as u64)
        };

        let total_chunks = size.div_ceil(chunk_size);
        if total_chunks == 0 {
            return Err(Error::InvalidUpload("invalid chunk geometry".to_string()));
        }

        let id = Uuid::new_v4().simple().to_string();
        let temp_path = root.join(format!(".mizban-upload-{id}.part"));
        let final_path = safe_join(&root, &name)
            .map_err(|_| Error::InvalidUpload("invalid destination".to_string()))?;

        fs::create_dir_all(&root)?;
        let file = open_exclusive(&temp_path)?;
        if let Err(err) = file.set_len(size) {
            drop(file);
            let _ = fs::remove_file(&temp_path);
            return Err(err.into());
        }

        let now = Instant::now();
        let session = Arc::new(UploadSession {
            id: id.clone(),
            filename: name.clone(),
            temp_path,
            final_path,
            size,
            chunk_size,
            total_chunks: total_chunks as usize,
            created_at: now,
            state: Mutex::new(SessionState {
                chunk_states: vec![ChunkState::Pending; total_chunks as usize],
                received_count: 0,
                completed: false,
                last_seen: now,
                file: Some(Arc::new(file)),
            }),
        });

        self.inner
            .registry
            .write()
            .sessions
            .insert(id.clone(), session);

        tracing::info!(upload_id = %id, filename = %name, size, chunk_size, total_chunks, "upload session created");

        Ok(UploadInit {
            upload_id: id,
            filename: name,
            size,
            chunk_size,
            total_chunks,
        })
    }

    /// Write one chunk of an upload at its negotiated offset.
    ///
    /// Duplicate submissions of an already-complete chunk succeed without
    /// touching the file. A failed or short write reverts the chunk to
    /// pending so the client can retry it.
    ///
    /// # Errors
    ///
    /// [`Error::SessionNotFound`] for unknown ids, [`Error::InvalidUpload`]
    /// for geometry mismatches and write collisions, I/O errors for transport
    /// or disk failures (retryable).
    pub async fn write_chunk<R>(
        &self,
        upload_id: &str,
        chunk_index: u64,
        offset: u64,
        content_length: u64,
        mut body: R,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        if content_length == 0 {
            return Err(Error::InvalidUpload("invalid chunk length".to_string()));
        }

        let session = self.get(upload_id).ok_or(Error::SessionNotFound)?;

        // `Some(file)` once the chunk is claimed for writing; `None` if it
        // was already complete and the body just needs to be drained.
        let claimed = {
            let mut state = session.state.lock();
            if state.completed {
                return Err(Error::InvalidUpload(
                    "upload already completed".to_string(),
                ));
            }
            if chunk_index >= session.total_chunks as u64 {
                return Err(Error::InvalidUpload("chunk index out of range".to_string()));
            }
            if offset != chunk_index * session.chunk_size {
                return Err(Error::InvalidUpload("chunk offset mismatch".to_string()));
            }
            let index = chunk_index as usize;
            if content_length != session.expected_chunk_size(index) {
                return Err(Error::InvalidUpload("chunk size mismatch".to_string()));
            }

            match state.chunk_states[index] {
                ChunkState::Complete => {
                    state.last_seen = Instant::now();
                    None
                }
                ChunkState::Writing => {
                    return Err(Error::InvalidUpload(
                        "chunk currently being written".to_string(),
                    ));
                }
                ChunkState::Pending => {
                    let file = state
                        .file
                        .as_ref()
                        .map(Arc::clone)
                        .ok_or(Error::SessionNotFound)?;
                    state.chunk_states[index] = ChunkState::Writing;
                    Some(file)
                }
            }
        };

        let Some(file) = claimed else {
            // Retried duplicate: drain the body so the connection stays
            // usable, then report success.
            let _ = tokio::io::copy(
                &mut (&mut body).take(content_length),
                &mut tokio::io::sink(),
            )
            .await;
            return Ok(());
        };

        // The actual copy runs without any lock held; other chunks of this
        // session proceed in parallel against disjoint byte ranges.
        let result = copy_body_at(&file, &mut body, offset, content_length).await;

        let index = chunk_index as usize;
        let mut state = session.state.lock();
        state.last_seen = Instant::now();
        match result {
            Ok(()) => {
                if state.chunk_states[index] != ChunkState::Complete {
                    state.chunk_states[index] = ChunkState::Complete;
                    state.received_count += 1;
                }
                Ok(())
            }
            Err(err) => {
                state.chunk_states[index] = ChunkState::Pending;
                tracing::warn!(upload_id = %session.id, chunk_index, %err, "chunk write failed, reverted to pending");
                Err(err)
            }
        }
    }

    /// Finalize an upload: fsync, close, and atomically rename the temp file
    /// over its destination. Idempotent once the session is marked complete.
    ///
    /// # Errors
    ///
    /// [`Error::SessionNotFound`] for unknown ids,
    /// [`Error::IncompleteUpload`] when chunks are still missing, I/O errors
    /// if the sync or rename fails.
    pub async fn complete(&self, upload_id: &str) -> Result<String> {
        let session = self.get(upload_id).ok_or(Error::SessionNotFound)?;

        let file = {
            let mut state = session.state.lock();
            if state.completed {
                return Ok(session.filename.clone());
            }
            let missing = session.total_chunks - state.received_count;
            if missing > 0 {
                return Err(Error::IncompleteUpload {
                    missing_chunks: missing,
                });
            }
            state.completed = true;
            state.file.take()
        };

        if let Some(file) = file {
            let synced = tokio::task::spawn_blocking(move || {
                let result = file.sync_all();
                drop(file);
                result
            })
            .await
            .map_err(|err| Error::Internal(format!("finalize task failed: {err}")))?;
            synced?;
        }

        let temp_path = session.temp_path.clone();
        let final_path = session.final_path.clone();
        tokio::task::spawn_blocking(move || replace_file(&temp_path, &final_path))
            .await
            .map_err(|err| Error::Internal(format!("finalize task failed: {err}")))??;

        let thumb_dir = self.inner.registry.read().thumb_dir.clone();
        if let Ok(thumb_path) = safe_join(&thumb_dir, &format!("{}.jpg", session.filename)) {
            let source = session.final_path.clone();
            tokio::spawn(async move {
                let _ = tokio::task::spawn_blocking(move || thumb::generate(&source, &thumb_path))
                    .await;
            });
        }

        self.inner.registry.write().sessions.remove(upload_id);

        tracing::info!(upload_id = %session.id, filename = %session.filename, "upload finalized");
        Ok(session.filename.clone())
    }

    /// Abort an upload, closing and removing its temp file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] for unknown ids.
    pub fn abort(&self, upload_id: &str) -> Result<()> {
        let session = self
            .inner
            .registry
            .write()
            .sessions
            .remove(upload_id)
            .ok_or(Error::SessionNotFound)?;
        cleanup_session(&session);
        tracing::info!(upload_id = %session.id, "upload session aborted");
        Ok(())
    }

    /// Replace the manager-wide size limits. In-flight sessions keep the
    /// geometry they negotiated at init time.
    pub fn update_limits(&self, max_file_size: u64, chunk_size: u64) {
        let mut registry = self.inner.registry.write();
        registry.max_file = clamp_max_file(max_file_size);
        registry.chunk_size = clamp_chunk_size(chunk_size);
    }

    /// Move the manager to a new shared root and thumbnail directory.
    ///
    /// Any in-flight session has its temp file under the old root and cannot
    /// be migrated atomically, so the contract is that a storage change
    /// invalidates active uploads: every session is detached and aborted.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if either directory cannot be created; in that
    /// case nothing changes.
    pub fn update_storage(
        &self,
        root: impl Into<PathBuf>,
        thumb_dir: impl Into<PathBuf>,
    ) -> Result<()> {
        let root = root.into();
        let thumb_dir = thumb_dir.into();
        fs::create_dir_all(&root)?;
        fs::create_dir_all(&thumb_dir)?;

        let detached: Vec<_> = {
            let mut registry = self.inner.registry.write();
            let detached = registry.sessions.drain().map(|(_, s)| s).collect();
            registry.root = root;
            registry.thumb_dir = thumb_dir;
            detached
        };

        if !detached.is_empty() {
            tracing::info!(count = detached.len(), "storage change aborted active uploads");
        }
        for session in &detached {
            cleanup_session(session);
        }
        Ok(())
    }

    fn get(&self, upload_id: &str) -> Option<Arc<UploadSession>> {
        self.inner.registry.read().sessions.get(upload_id).cloned()
    }
}

async fn sweep_loop(inner: Arc<Inner>, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // An interval's first tick fires immediately; skip it so the first sweep
    // happens a full period after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.tick() => sweep_stale(&inner),
        }
    }
}

fn sweep_stale(inner: &Inner) {
    let now = Instant::now();
    let mut expired = Vec::new();
    {
        let mut registry = inner.registry.write();
        let ttl = registry.session_ttl;
        registry.sessions.retain(|_, session| {
            let stale = now.duration_since(session.state.lock().last_seen) > ttl;
            if stale {
                expired.push(Arc::clone(session));
            }
            !stale
        });
    }

    for session in &expired {
        tracing::info!(upload_id = %session.id, "reclaiming stale upload session");
        cleanup_session(session);
    }
}

fn cleanup_session(session: &UploadSession) {
    // Closing before unlinking matters on platforms that refuse to remove
    // open files.
    let file = session.state.lock().file.take();
    drop(file);

    if let Err(err) = fs::remove_file(&session.temp_path) {
        if err.kind() != io::ErrorKind::NotFound {
            tracing::warn!(
                path = %session.temp_path.display(),
                %err,
                "failed to remove upload temp file"
            );
        }
    }
}

async fn copy_body_at<R>(
    file: &Arc<File>,
    body: &mut R,
    offset: u64,
    content_length: u64,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = body.take(content_length);
    let mut buf = vec![0u8; COPY_BUFFER_SIZE.min(content_length as usize)];
    let mut written: u64 = 0;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let file = Arc::clone(file);
        let at = offset + written;
        buf = tokio::task::spawn_blocking(move || -> io::Result<Vec<u8>> {
            write_all_at(&file, &buf[..n], at)?;
            Ok(buf)
        })
        .await
        .map_err(|err| Error::Internal(format!("chunk write task failed: {err}")))??;
        written += n as u64;
    }

    if written != content_length {
        return Err(Error::InvalidUpload("short chunk write".to_string()));
    }
    Ok(())
}

fn open_exclusive(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    options.open(path)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut buf = buf;
    let mut offset = offset;
    while !buf.is_empty() {
        let written = file.seek_write(buf, offset)?;
        if written == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "failed to write whole chunk",
            ));
        }
        buf = &buf[written..];
        offset += written as u64;
    }
    Ok(())
}

fn clamp_chunk_size(value: u64) -> u64 {
    let value = if value == 0 {
        DEFAULT_CHUNK_SIZE_BYTES
    } else {
        value
    };
    value.clamp(MIN_CHUNK_SIZE_BYTES, MAX_CHUNK_SIZE_BYTES)
}

fn clamp_max_file(value: u64) -> u64 {
    if value == 0 {
        MAX_FILE_SIZE_LIMIT
    } else {
        value.min(MAX_FILE_SIZE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_manager(root: &Path) -> UploadManager {
        UploadManager::new(root, root.join(".thumb"), 100 * 1024 * 1024, 0)
    }

    #[tokio::test]
    async fn temp_file_is_presized_and_hidden() {
        let dir = TempDir::new().unwrap();
        let mgr = test_manager(dir.path());

        let init = mgr.init("big.bin", 1_000_000, 0).unwrap();
        let temp = dir
            .path()
            .join(format!(".mizban-upload-{}.part", init.upload_id));
        let meta = fs::metadata(&temp).unwrap();
        assert_eq!(meta.len(), 1_000_000);

        mgr.abort(&init.upload_id).unwrap();
        assert!(!temp.exists());
        mgr.close().await;
    }

    #[tokio::test]
    async fn init_rejects_invalid_requests() {
        let dir = TempDir::new().unwrap();
        let mgr = test_manager(dir.path());

        assert!(matches!(
            mgr.init("../evil.bin", 10, 0),
            Err(Error::InvalidUpload(_))
        ));
        assert!(matches!(
            mgr.init("ok.bin", 0, 0),
            Err(Error::InvalidUpload(_))
        ));
        assert!(matches!(
            mgr.init("ok.bin", -5, 0),
            Err(Error::InvalidUpload(_))
        ));
        assert!(matches!(
            mgr.init("ok.bin", 200 * 1024 * 1024, 0),
            Err(Error::InvalidUpload(_))
        ));
        mgr.close().await;
    }

    #[tokio::test]
    async fn chunk_geometry_boundaries() {
        let dir = TempDir::new().unwrap();
        let mgr = test_manager(dir.path());
        let chunk = MIN_CHUNK_SIZE_BYTES as i64;

        let one_byte = mgr.init("a.bin", 1, chunk).unwrap();
        assert_eq!(one_byte.total_chunks, 1);
        assert_eq!(one_byte.chunk_size, MIN_CHUNK_SIZE_BYTES);

        let exact = mgr.init("b.bin", chunk, chunk).unwrap();
        assert_eq!(exact.total_chunks, 1);

        let one_over = mgr.init("c.bin", chunk + 1, chunk).unwrap();
        assert_eq!(one_over.total_chunks, 2);

        // Requested sizes outside the supported range are clamped.
        let clamped_up = mgr.init("d.bin", 10, 16).unwrap();
        assert_eq!(clamped_up.chunk_size, MIN_CHUNK_SIZE_BYTES);
        let clamped_down = mgr.init("e.bin", 10, 128 * 1024 * 1024).unwrap();
        assert_eq!(clamped_down.chunk_size, MAX_CHUNK_SIZE_BYTES);

        mgr.close().await;
    }

    #[tokio::test]
    async fn write_chunk_validates_geometry() {
        let dir = TempDir::new().unwrap();
        let mgr = test_manager(dir.path());
        let chunk = MIN_CHUNK_SIZE_BYTES;

        let init = mgr.init("v.bin", (chunk * 2) as i64, chunk as i64).unwrap();
        let payload = vec![7u8; chunk as usize];

        // Unknown session.
        assert!(matches!(
            mgr.write_chunk("ffffffffffffffffffffffffffffffff", 0, 0, chunk, &payload[..])
                .await,
            Err(Error::SessionNotFound)
        ));
        // Index out of range.
        assert!(matches!(
            mgr.write_chunk(&init.upload_id, 2, 2 * chunk, chunk, &payload[..])
                .await,
            Err(Error::InvalidUpload(_))
        ));
        // Offset mismatch.
        assert!(matches!(
            mgr.write_chunk(&init.upload_id, 1, 0, chunk, &payload[..]).await,
            Err(Error::InvalidUpload(_))
        ));
        // Length mismatch.
        assert!(matches!(
            mgr.write_chunk(&init.upload_id, 0, 0, chunk - 1, &payload[..chunk as usize - 1])
                .await,
            Err(Error::InvalidUpload(_))
        ));
        // Zero length.
        assert!(matches!(
            mgr.write_chunk(&init.upload_id, 0, 0, 0, &payload[..0]).await,
            Err(Error::InvalidUpload(_))
        ));

        mgr.close().await;
    }

    #[tokio::test]
    async fn short_body_reverts_chunk_to_pending() {
        let dir = TempDir::new().unwrap();
        let mgr = test_manager(dir.path());
        let chunk = MIN_CHUNK_SIZE_BYTES;

        let init = mgr.init("s.bin", chunk as i64, chunk as i64).unwrap();
        let truncated = vec![1u8; (chunk / 2) as usize];
        assert!(matches!(
            mgr.write_chunk(&init.upload_id, 0, 0, chunk, &truncated[..]).await,
            Err(Error::InvalidUpload(_))
        ));

        // The chunk is pending again, so a full retry succeeds.
        let full = vec![1u8; chunk as usize];
        mgr.write_chunk(&init.upload_id, 0, 0, chunk, &full[..])
            .await
            .unwrap();
        mgr.complete(&init.upload_id).await.unwrap();
        mgr.close().await;
    }

    #[tokio::test]
    async fn sweeper_reclaims_stale_sessions() {
        let dir = TempDir::new().unwrap();
        let mgr = test_manager(dir.path());

        let init = mgr.init("stale.bin", 64, 0).unwrap();
        let temp = dir
            .path()
            .join(format!(".mizban-upload-{}.part", init.upload_id));
        assert!(temp.exists());

        mgr.inner.registry.write().session_ttl = Duration::ZERO;
        tokio::time::sleep(Duration::from_millis(10)).await;
        sweep_stale(&mgr.inner);

        assert!(mgr.inner.registry.read().sessions.is_empty());
        assert!(!temp.exists());
        mgr.close().await;
    }

    #[tokio::test]
    async fn close_aborts_remaining_sessions() {
        let dir = TempDir::new().unwrap();
        let mgr = test_manager(dir.path());

        let init = mgr.init("open.bin", 64, 0).unwrap();
        let temp = dir
            .path()
            .join(format!(".mizban-upload-{}.part", init.upload_id));
        mgr.close().await;
        assert!(!temp.exists());
    }
}
