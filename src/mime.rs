//! MIME type lookup by file extension.

/// Map a file extension (without the leading dot) to its MIME type.
/// Unknown extensions return `None`; the server refuses to guess.
pub fn from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "txt" => Some("text/plain"),
        "html" => Some("text/html"),
        "jpg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}
