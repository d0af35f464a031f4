//! MIME type detection for the static asset handler.

use std::path::Path;

/// Common MIME type constants.
pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const JSON: &str = "application/json";
    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const WASM: &str = "application/wasm";

    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";

    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";
}

/// Guess MIME type from file extension.
///
/// Returns a full MIME type string suitable for a Content-Type header.
pub fn from_path(path: &Path) -> &'static str {
    use types::*;

    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => HTML,
        Some("txt") => PLAIN,
        Some("css") => CSS,
        Some("js") | Some("mjs") => JAVASCRIPT,
        Some("json") | Some("map") => JSON,
        Some("wasm") => WASM,
        Some("png") => PNG,
        Some("jpg") | Some("jpeg") => JPEG,
        Some("gif") => GIF,
        Some("webp") => WEBP,
        Some("svg") => SVG,
        Some("ico") => ICO,
        Some("woff") => WOFF,
        Some("woff2") => WOFF2,
        Some("ttf") => TTF,
        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_known_extensions() {
        assert_eq!(from_path(Path::new("app.js")), types::JAVASCRIPT);
        assert_eq!(from_path(Path::new("chunk.abc123.mjs")), types::JAVASCRIPT);
        assert_eq!(from_path(Path::new("index.html")), types::HTML);
        assert_eq!(from_path(Path::new("style.css")), types::CSS);
    }

    #[test]
    fn test_unknown_extension_falls_back() {
        assert_eq!(from_path(Path::new("data.bin")), types::OCTET_STREAM);
        assert_eq!(from_path(Path::new("noext")), types::OCTET_STREAM);
    }
}
