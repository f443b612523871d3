//! Library scanner.
//!
//! Walks the configured roots, keeps files with a supported video extension,
//! and registers every path the index has not seen before. All new records of
//! one scan are inserted in a single transaction, so they have stable ids by
//! the time the pipeline runs.
//!
//! Known paths are loaded into a `HashSet` once up front instead of being
//! looked up per file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use nepenthe_common::paths::{is_video_file, normalize_path};
use nepenthe_common::{Error, Result};
use nepenthe_db::models::{NewVideo, Video};
use nepenthe_db::queries::videos;
use rusqlite::Connection;
use serde::Serialize;

/// Result of one scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    /// Records created by this scan, with their assigned ids.
    pub new_records: Vec<Video>,
    /// Number of records in the index after the scan.
    pub total_records: i64,
    /// Roots that existed and were walked.
    pub roots_scanned: usize,
    /// Roots that were skipped because they are not directories.
    pub roots_skipped: usize,
}

/// Deduplicate roots by their canonical absolute form, keeping first-seen order.
pub fn dedup_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    roots
        .iter()
        .map(|root| normalize_path(root))
        .filter(|root| seen.insert(root.clone()))
        .collect()
}

/// All supported video files below `root`.
///
/// Unreadable entries are logged and skipped.
pub fn discover_videos(root: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "Error walking directory");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_video_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// Scan `roots` and register unseen video files.
///
/// Missing or non-directory roots are logged and skipped. Re-scanning an
/// unchanged tree creates nothing.
pub fn scan(conn: &Connection, roots: &[PathBuf]) -> Result<ScanOutcome> {
    let roots = dedup_roots(roots);
    let mut outcome = ScanOutcome::default();

    let mut known: HashSet<String> = videos::list_video_paths(conn)?
        .into_iter()
        .map(|(_, path)| path)
        .collect();

    let mut batch = Vec::new();
    for root in &roots {
        if !root.is_dir() {
            tracing::warn!(root = %root.display(), "Library root does not exist or is not a directory, skipping");
            outcome.roots_skipped += 1;
            continue;
        }
        outcome.roots_scanned += 1;

        let folder = root.to_string_lossy().to_string();
        let mut found = 0usize;
        for path in discover_videos(root) {
            found += 1;
            let path_str = path.to_string_lossy().to_string();
            // Nested roots can yield the same file twice.
            if !known.insert(path_str.clone()) {
                continue;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path_str.clone());
            batch.push(NewVideo::new(name, path_str, folder.clone()));
        }
        tracing::debug!(root = %root.display(), files = found, "Walked library root");
    }

    if !batch.is_empty() {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        outcome.new_records = videos::insert_videos(&tx, &batch)?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;
    }

    outcome.total_records = videos::count_videos(conn)?;

    tracing::info!(
        roots = outcome.roots_scanned,
        skipped = outcome.roots_skipped,
        new = outcome.new_records.len(),
        total = outcome.total_records,
        "Library scan complete"
    );

    Ok(outcome)
}
