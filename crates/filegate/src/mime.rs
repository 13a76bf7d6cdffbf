//! MIME type resolution.
//!
//! Extension lookup comes first; when the extension is unknown the file head
//! is sniffed for a handful of magic numbers. Types that can execute script
//! when rendered inline are downgraded to plain text before being handed to
//! a previewer.

use std::io::Read;
use std::path::Path;

/// Fixed type reported for directories.
pub const DIRECTORY_MIME: &str = "inode/directory";

/// Fallback type when nothing about the content is recognizable.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Number of leading bytes examined by content sniffing.
const SNIFF_LEN: usize = 512;

/// Types that are not safe to render inline and the value they downgrade to.
const PREVIEW_UNSAFE: &[&str] = &[
    "image/svg+xml",
    "text/html",
    "application/xhtml+xml",
    "text/javascript",
    "application/javascript",
];

const PREVIEW_DOWNGRADE: &str = "text/plain; charset=utf-8";

/// Resolves the MIME type of a local path.
///
/// Directories get [`DIRECTORY_MIME`]. Files are matched by extension first,
/// then by sniffing the first [`SNIFF_LEN`] bytes. An unreadable file falls
/// back to [`OCTET_STREAM`] rather than failing, since the type is advisory.
pub fn mime_type_for_path(path: &Path) -> String {
    if path.is_dir() {
        return DIRECTORY_MIME.to_string();
    }
    if let Some(by_extension) = mime_guess::from_path(path).first_raw() {
        return by_extension.to_string();
    }
    match read_head(path) {
        Ok(head) => sniff(&head).to_string(),
        Err(_) => OCTET_STREAM.to_string(),
    }
}

/// Guesses a type from the leading bytes of a file.
pub fn sniff(head: &[u8]) -> &'static str {
    const MAGIC: &[(&[u8], &str)] = &[
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b", "application/gzip"),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"\x7fELF", "application/x-executable"),
    ];
    for (magic, mime) in MAGIC {
        if head.starts_with(magic) {
            return mime;
        }
    }
    if head.is_empty() || head.contains(&0) {
        OCTET_STREAM
    } else {
        "text/plain"
    }
}

/// Downgrades types that can run script when rendered inline.
///
/// Parameters after the essence (charset and the like) are ignored for the
/// comparison but preserved on types that pass through.
pub fn preview_safe(mime: &str) -> String {
    let essence = match mime.split_once(';') {
        Some((essence, _)) => essence,
        None => mime,
    };
    if PREVIEW_UNSAFE.contains(&essence.trim()) {
        PREVIEW_DOWNGRADE.to_string()
    } else {
        mime.to_string()
    }
}

fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = std::fs::File::open(path)?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn test_extension_lookup_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.pdf");
        // Content says text, extension says PDF; extension is checked first.
        std::fs::write(&path, b"hello").unwrap();
        assert_eq!(mime_type_for_path(&path), "application/pdf");
    }

    #[test]
    fn test_common_extensions() {
        let dir = TempDir::new().unwrap();
        for (name, expected) in [
            ("notes.txt", "text/plain"),
            ("photo.png", "image/png"),
            ("page.html", "text/html"),
            ("diagram.svg", "image/svg+xml"),
        ] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"x").unwrap();
            assert_eq!(mime_type_for_path(&path), expected, "for {}", name);
        }
    }

    #[test]
    fn test_sniff_fallback_for_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("document");
        std::fs::write(&path, b"%PDF-1.7\nrest of the file").unwrap();
        assert_eq!(mime_type_for_path(&path), "application/pdf");
    }

    #[test]
    fn test_sniff_text_without_nul_bytes() {
        assert_eq!(sniff(b"#!/bin/sh\necho hello\n"), "text/plain");
    }

    #[test]
    fn test_sniff_binary_with_nul_bytes() {
        assert_eq!(sniff(b"\x00\x01\x02\x03"), OCTET_STREAM);
    }

    #[test]
    fn test_sniff_empty_head() {
        assert_eq!(sniff(b""), OCTET_STREAM);
    }

    #[test]
    fn test_sniff_magic_numbers() {
        assert_eq!(sniff(b"\x89PNG\r\n\x1a\n...."), "image/png");
        assert_eq!(sniff(b"\xff\xd8\xff\xe0JFIF"), "image/jpeg");
        assert_eq!(sniff(b"GIF89a......"), "image/gif");
        assert_eq!(sniff(b"PK\x03\x04...."), "application/zip");
        assert_eq!(sniff(b"\x1f\x8b\x08...."), "application/gzip");
        assert_eq!(sniff(b"\x7fELF\x02\x01\x01"), "application/x-executable");
    }

    #[test]
    fn test_directory_mime() {
        let dir = TempDir::new().unwrap();
        assert_eq!(mime_type_for_path(dir.path()), DIRECTORY_MIME);
    }

    #[test]
    fn test_missing_file_falls_back_to_octet_stream() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vanished");
        assert_eq!(mime_type_for_path(&path), OCTET_STREAM);
    }

    #[test]
    fn test_preview_safe_downgrades_active_content() {
        assert_eq!(preview_safe("image/svg+xml"), "text/plain; charset=utf-8");
        assert_eq!(preview_safe("text/html"), "text/plain; charset=utf-8");
        assert_eq!(
            preview_safe("application/xhtml+xml"),
            "text/plain; charset=utf-8"
        );
        assert_eq!(preview_safe("text/javascript"), "text/plain; charset=utf-8");
        assert_eq!(
            preview_safe("application/javascript"),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_preview_safe_ignores_parameters_when_matching() {
        assert_eq!(
            preview_safe("text/html; charset=iso-8859-1"),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_preview_safe_passes_inert_types_through() {
        assert_eq!(preview_safe("image/png"), "image/png");
        assert_eq!(preview_safe("application/pdf"), "application/pdf");
        assert_eq!(
            preview_safe("text/plain; charset=utf-8"),
            "text/plain; charset=utf-8"
        );
    }
}
