//! Best-effort thumbnail generation for common image formats.
//!
//! Thumbnails are a pure side effect of uploads: callers fire this off and
//! ignore the result. Anything that is not a supported image format is a
//! silent no-op.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::share::replace_file;

/// Longest edge of a generated thumbnail.
const MAX_DIMENSION: u32 = 200;

/// JPEG quality of generated thumbnails.
const JPEG_QUALITY: u8 = 85;

/// Generate a JPEG thumbnail of `src` at `dst`.
///
/// Unsupported extensions return `Ok(())` without touching the filesystem.
/// The thumbnail is written to a sibling temp file and renamed into place so
/// readers never observe a partial image.
///
/// # Errors
///
/// Returns an error if the image cannot be decoded or the thumbnail cannot
/// be written; callers are expected to ignore it.
pub fn generate(src: &Path, dst: &Path) -> Result<()> {
    if !is_supported(src) {
        return Ok(());
    }

    let img = image::open(src)
        .map_err(|err| Error::Internal(format!("decode {}: {err}", src.display())))?;
    let resized = img.thumbnail(MAX_DIMENSION, MAX_DIMENSION);

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_sibling(dst);
    let mut out = fs::File::create(&tmp)?;
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    if let Err(err) = resized.into_rgb8().write_with_encoder(encoder) {
        drop(out);
        let _ = fs::remove_file(&tmp);
        return Err(Error::Internal(format!("encode thumbnail: {err}")));
    }
    drop(out);

    if let Err(err) = replace_file(&tmp, dst) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

fn temp_sibling(dst: &Path) -> PathBuf {
    let mut name = dst.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "jpg" | "jpeg" | "png" | "gif" | "webp"
            )
        })
}
