//! Shared-root management and path safety.
//!
//! Everything the HTTP layer touches on disk goes through this module: client
//! supplied names and relative paths are validated here before they are ever
//! joined under the shared root, and the root itself is mutable at runtime
//! behind a reader/writer lock.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use percent_encoding::percent_decode_str;

use crate::error::{Error, Result};

/// Reduce a client-supplied filename to a single safe leaf name.
///
/// Surrounding whitespace is trimmed, backslashes are treated as path
/// separators, and only the final segment survives. Empty names, NUL bytes,
/// `.` and `..` are rejected.
///
/// # Errors
///
/// Returns [`Error::UnsafePath`] for any name that does not reduce to a
/// plain leaf.
pub fn sanitize_filename(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() || name.contains('\0') {
        return Err(Error::UnsafePath);
    }

    let normalized = name.replace('\\', "/");
    let trimmed = normalized.trim_end_matches('/');
    let base = trimmed.rsplit('/').next().unwrap_or("");
    if base.is_empty() || base == "." || base == ".." {
        return Err(Error::UnsafePath);
    }
    Ok(base.to_string())
}

/// Join a client-supplied relative path under `root`, guaranteeing the result
/// stays inside `root`.
///
/// The input is percent-decoded, backslash-normalized, and lexically cleaned
/// before joining; anything that is empty, contains NUL, or still references a
/// parent directory after cleaning is rejected.
///
/// # Errors
///
/// Returns [`Error::UnsafePath`] when the path cannot be proven to stay
/// under `root`.
pub fn safe_join(root: &Path, relative: &str) -> Result<PathBuf> {
    let decoded = percent_decode_str(relative)
        .decode_utf8()
        .map_err(|_| Error::UnsafePath)?;
    if decoded.is_empty() || decoded.contains('\0') {
        return Err(Error::UnsafePath);
    }

    let normalized = decoded.replace('\\', "/");
    let clean = clean_rooted(&normalized);
    if clean.is_empty() || clean == "." {
        return Err(Error::UnsafePath);
    }
    if clean == ".." || clean.starts_with("../") || clean.contains("/../") {
        return Err(Error::UnsafePath);
    }

    let mut joined = root.to_path_buf();
    for segment in clean.split('/') {
        joined.push(segment);
    }
    if !joined.starts_with(root) {
        return Err(Error::UnsafePath);
    }
    Ok(joined)
}

/// Lexically clean a slash path as if it were rooted: `.` and empty segments
/// drop out, and `..` pops the previous segment (or vanishes at the root).
fn clean_rooted(input: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in input.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Rename `src` over `dst`, tolerating platforms where rename does not
/// replace an existing destination.
pub(crate) fn replace_file(src: &Path, dst: &Path) -> io::Result<()> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    match fs::remove_file(dst) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    fs::rename(src, dst)
}

/// Owns the current shared-root path and resolves client paths under it.
///
/// The root can be swapped at runtime (the admin API does this); reads and
/// writes are serialized by a reader/writer lock.
#[derive(Debug)]
pub struct ShareManager {
    root: RwLock<PathBuf>,
}

impl ShareManager {
    /// Create a manager for the given shared root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: RwLock::new(root.into()),
        }
    }

    /// Current shared root.
    pub fn root(&self) -> PathBuf {
        self.root.read().clone()
    }

    /// Point the manager at a different shared root.
    pub fn set_root(&self, root: impl Into<PathBuf>) {
        *self.root.write() = root.into();
    }

    /// Create the shared root if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the directory cannot be created.
    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(self.root())
    }

    /// List the regular files in the shared root, sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the root cannot be read.
    pub fn list_files(&self) -> io::Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(self.root())? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Resolve a client-supplied relative path under the current root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsafePath`] when the path would escape the root.
    pub fn join(&self, relative: &str) -> Result<PathBuf> {
        safe_join(&self.root(), relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_accepts_plain_names() {
        assert_eq!(sanitize_filename("report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_filename("  spaced.txt  ").unwrap(), "spaced.txt");
        assert_eq!(sanitize_filename("dir/leaf.bin").unwrap(), "leaf.bin");
        assert_eq!(sanitize_filename("dir\\leaf.bin").unwrap(), "leaf.bin");
        assert_eq!(sanitize_filename("trailing/").unwrap(), "trailing");
    }

    #[test]
    fn sanitize_rejects_unsafe_names() {
        for name in ["", "   ", ".", "..", "a/..", "nul\0byte", "/", "//"] {
            assert!(
                sanitize_filename(name).is_err(),
                "expected rejection for {name:?}"
            );
        }
    }

    #[test]
    fn sanitize_is_idempotent_on_accepted_output() {
        for name in ["file.txt", "a/b/c.bin", "  pad.log ", "win\\style.doc"] {
            let first = sanitize_filename(name).unwrap();
            let second = sanitize_filename(&first).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn safe_join_keeps_result_under_root() {
        let root = Path::new("/srv/shared");
        for rel in ["file.txt", "nested/dir/file.txt", "a%20b.txt", "x/./y"] {
            let joined = safe_join(root, rel).unwrap();
            assert!(joined.starts_with(root), "{rel:?} escaped to {joined:?}");
        }
    }

    #[test]
    fn safe_join_rejects_unsafe_input() {
        let root = Path::new("/srv/shared");
        for rel in ["", ".", "..", "../", "/", "%2e%2e", "nul\0byte"] {
            assert!(safe_join(root, rel).is_err(), "expected rejection for {rel:?}");
        }
    }

    #[test]
    fn safe_join_collapses_parent_refs_inside_root() {
        // Rooted cleaning absorbs leading `..` segments instead of letting
        // them escape, so these resolve under root rather than erroring.
        let root = Path::new("/srv/shared");
        assert_eq!(
            safe_join(root, "../etc/passwd").unwrap(),
            root.join("etc").join("passwd")
        );
        assert_eq!(
            safe_join(root, "a/../../etc/passwd").unwrap(),
            root.join("etc").join("passwd")
        );
        assert_eq!(safe_join(root, "%2e%2e/secret").unwrap(), root.join("secret"));
        assert_eq!(safe_join(root, "%2e%2e%2fsecret").unwrap(), root.join("secret"));
        assert_eq!(safe_join(root, "..\\windows").unwrap(), root.join("windows"));
    }

    #[test]
    fn safe_join_decodes_percent_escapes() {
        let root = Path::new("/srv/shared");
        let joined = safe_join(root, "hello%20world.txt").unwrap();
        assert_eq!(joined, root.join("hello world.txt"));
    }

    #[test]
    fn safe_join_absorbs_leading_slashes() {
        let root = Path::new("/srv/shared");
        let joined = safe_join(root, "/file.txt").unwrap();
        assert_eq!(joined, root.join("file.txt"));
    }

    #[test]
    fn list_files_skips_directories_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let mgr = ShareManager::new(dir.path());
        assert_eq!(mgr.list_files().unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn set_root_swaps_the_resolution_base() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();

        let mgr = ShareManager::new(first.path());
        assert_eq!(mgr.join("f").unwrap(), first.path().join("f"));

        mgr.set_root(second.path());
        assert_eq!(mgr.join("f").unwrap(), second.path().join("f"));
    }

    #[test]
    fn replace_file_overwrites_existing_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"new").unwrap();
        fs::write(&dst, b"old").unwrap();

        replace_file(&src, &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"new");
        assert!(!src.exists());
    }
}
