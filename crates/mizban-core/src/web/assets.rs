//! Embedded web UI assets.
//!
//! The front-end is compiled into the binary with `rust-embed`. At startup
//! the runtime prefers an on-disk `web/` directory (development builds,
//! packagers that ship assets separately); when none is found, the embedded
//! copy is materialized into a temp directory and served from there, so the
//! static handler is always a plain directory-backed file server.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rust_embed::RustEmbed;

/// Embedded front-end assets.
#[derive(RustEmbed)]
#[folder = "src/web/assets/"]
pub struct Assets;

/// Find an on-disk web asset directory.
///
/// Candidates, in order: the explicit directory (if given), `<cwd>/web`,
/// `<exe dir>/web`, `<exe dir>/../web`. A candidate counts only if it
/// contains an `index.html`.
pub fn resolve_web_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::with_capacity(4);
    if let Some(dir) = explicit {
        candidates.push(dir.to_path_buf());
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("web"));
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            candidates.push(exe_dir.join("web"));
            candidates.push(exe_dir.join("..").join("web"));
        }
    }

    candidates
        .into_iter()
        .find(|dir| dir.join("index.html").is_file())
}

/// Write every embedded asset into `dir`, preserving relative paths.
///
/// # Errors
///
/// Returns an error if any file cannot be written, or if the embedded set
/// is missing `index.html`.
pub fn materialize_to(dir: &Path) -> io::Result<()> {
    for name in Assets::iter() {
        let target = dir.join(name.as_ref());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = Assets::get(name.as_ref())
            .ok_or_else(|| io::Error::other(format!("missing embedded asset: {name}")))?;
        fs::write(&target, content.data.as_ref())?;
    }

    if !dir.join("index.html").is_file() {
        return Err(io::Error::other("embedded index.html missing"));
    }
    Ok(())
}
