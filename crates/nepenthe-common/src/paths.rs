//! Path utilities for the library index.
//!
//! Detects supported video files by extension, names thumbnail files
//! deterministically from record IDs, and decides whether a path lies under a
//! configured library root.

use std::path::{Path, PathBuf};

use crate::VideoId;

/// List of supported video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm", "flv", "ts"];

/// Extension used for generated thumbnail files.
pub const THUMBNAIL_EXTENSION: &str = "jpg";

/// Prefix used for generated thumbnail files.
const THUMBNAIL_PREFIX: &str = "video_";

/// Check if a path has a supported video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use nepenthe_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("clip.MP4")));
/// assert!(is_video_file(Path::new("/videos/show.ts")));
/// assert!(!is_video_file(Path::new("notes.txt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Get the list of supported video file extensions.
pub fn video_extensions() -> &'static [&'static str] {
    VIDEO_EXTENSIONS
}

/// Thumbnail file name for a record, e.g. `video_12.jpg`.
pub fn thumbnail_file_name(id: VideoId) -> String {
    format!("{THUMBNAIL_PREFIX}{id}.{THUMBNAIL_EXTENSION}")
}

/// Whether a file name follows the thumbnail naming convention.
///
/// Only the extension is checked so that stray previews left by older
/// naming schemes are also reclaimed by the sweep.
pub fn is_thumbnail_file(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(THUMBNAIL_EXTENSION))
}

/// Canonical absolute form of a path.
///
/// Falls back to a lexical absolute path when the path does not exist (for
/// example a record whose file was removed), so comparisons still work.
pub fn normalize_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Whether `path` is exactly `root` or lies beneath it.
///
/// Comparison is component-wise, so `/media/film` is not under `/media/fil`.
/// Both arguments are expected to be normalized already.
pub fn is_under_root(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Whether `path` lies under any of `roots`.
pub fn is_under_any_root(path: &Path, roots: &[PathBuf]) -> bool {
    roots.iter().any(|root| is_under_root(path, root))
}
