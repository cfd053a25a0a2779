//! QR code rendering for the server URL.
//!
//! Two renderings of the same payload: compact Unicode half-block art for the
//! startup banner, and a PNG for the admin page.

use image::Luma;
use qrcode::render::unicode;
use qrcode::{EcLevel, QrCode};

use crate::error::{Error, Result};

/// Render a URL as terminal-friendly QR art.
///
/// Low error correction keeps the code small enough to scan comfortably from
/// a terminal window for short LAN URLs.
///
/// # Errors
///
/// Returns an error if QR code generation fails.
pub fn generate_ascii(url: &str) -> Result<String> {
    let code = QrCode::with_error_correction_level(url, EcLevel::L)
        .map_err(|e| Error::Internal(format!("failed to generate QR code: {e}")))?;

    let rendered = code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();

    Ok(rendered)
}

/// Render a URL as a PNG image of roughly `size` x `size` pixels.
///
/// # Errors
///
/// Returns an error if QR code generation or PNG encoding fails.
pub fn generate_png(url: &str, size: u32) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(url, EcLevel::L)
        .map_err(|e| Error::Internal(format!("failed to generate QR code: {e}")))?;

    let image = code.render::<Luma<u8>>().build();
    let scaled = image::imageops::resize(&image, size, size, image::imageops::FilterType::Nearest);

    let mut png_bytes = Vec::new();
    {
        use image::ImageEncoder;
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&scaled, size, size, image::ExtendedColorType::L8)
            .map_err(|e| Error::Internal(format!("failed to encode PNG: {e}")))?;
    }

    Ok(png_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_uses_block_characters() {
        let qr = generate_ascii("http://192.168.1.10:8000/").unwrap();
        assert!(!qr.is_empty());
        assert!(qr.contains('█') || qr.contains('▀') || qr.contains('▄'));
        assert!(qr.lines().count() > 5);
    }

    #[test]
    fn different_urls_produce_different_codes() {
        let a = generate_ascii("http://192.168.1.10:8000/").unwrap();
        let b = generate_ascii("http://192.168.1.11:8000/").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn png_has_signature_and_payload() {
        let png = generate_png("http://192.168.1.10:8000/", 256).unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
        assert!(png.len() > 100);
    }
}
