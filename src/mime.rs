//! MIME type detection for downloaded payloads

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Guess an image MIME type from magic bytes
pub fn sniff(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return "image/png";
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return "image/gif";
    }
    if data.starts_with(b"RIFF") && data.len() > 12 && &data[8..12] == b"WEBP" {
        return "image/webp";
    }
    if data.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        return "image/x-icon";
    }
    if data.starts_with(b"BM") {
        return "image/bmp";
    }
    let head = &data[..data.len().min(256)];
    if let Ok(text) = std::str::from_utf8(head) {
        let text = text.trim_start();
        if text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg")) {
            return "image/svg+xml";
        }
    }
    OCTET_STREAM
}

/// Pick the MIME type for a payload: an `image/*` Content-Type wins,
/// otherwise the sniffed type
pub fn resolve(content_type: Option<&str>, data: &[u8]) -> String {
    match content_type {
        Some(ct) if ct.starts_with("image/") => ct.to_string(),
        _ => sniff(data).to_string(),
    }
}

/// Whether a payload is plausibly an image
///
/// Unknown binary data passes; recognizable non-image content such as
/// an HTML error page does not.
pub fn is_plausible_image(content_type: Option<&str>, data: &[u8]) -> bool {
    if sniff(data) != OCTET_STREAM {
        return true;
    }
    !matches!(
        content_type,
        Some(ct) if ct.starts_with("text/") || ct == "application/json"
    )
}
