//! MIME utilities shared across modules

const ALLOWED_IMAGE_MIME: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

#[must_use]
pub fn canonicalize_mime(mime: &str) -> String {
    let main = mime
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match main.as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        other => other.to_string(),
    }
}

/// Returns whether a given MIME type is supported for image analysis.
#[must_use]
pub fn is_supported_image_mime(mime: &str) -> bool {
    let canon = canonicalize_mime(mime);
    ALLOWED_IMAGE_MIME.contains(&canon.as_str())
}

/// Guess a MIME type from an attachment reference's path or file name.
/// Opaque file ids without an extension yield `None`.
#[must_use]
pub fn guess_mime_from_reference(reference: &str) -> Option<String> {
    let path = url::Url::parse(reference)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| reference.to_string());
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
}

/// Identify a supported image format from its leading bytes.
#[must_use]
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
