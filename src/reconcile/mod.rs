//! Orphan reconciliation and thumbnail sweeping.
//!
//! [`reconcile_orphans`] removes records whose path is no longer under any
//! configured root, together with their thumbnails. The record deletions are
//! one transaction: either every orphan goes or none does.
//!
//! [`sweep_unreferenced_thumbnails`] deletes thumbnail files that no record
//! points at.

use std::io;
use std::path::{Path, PathBuf};

use nepenthe_common::paths::{
    is_thumbnail_file, is_under_any_root, normalize_path, thumbnail_file_name,
};
use nepenthe_common::{Error, Result};
use nepenthe_db::queries::videos;
use rusqlite::Connection;
use serde::Serialize;

/// Outcome of [`reconcile_orphans`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Records removed from the index.
    pub removed: usize,
    /// Non-fatal problems, such as thumbnails that could not be deleted.
    pub errors: Vec<String>,
}

impl ReconcileReport {
    pub fn message(&self) -> String {
        cleanup_message(self.removed, self.errors.len())
    }
}

/// Human readable summary of a cleanup run.
pub fn cleanup_message(removed: usize, errors: usize) -> String {
    let mut message = format!("Cleanup finished. Removed {removed} orphaned video(s).");
    if errors > 0 {
        message.push_str(&format!(" Encountered {errors} error(s)."));
    }
    message
}

/// Both the lexical absolute form and the canonical form of a path.
///
/// Files reached through a symlink keep their lexical path in the index, so
/// a record counts as inside a root when either form matches.
fn path_forms(path: &Path) -> Vec<PathBuf> {
    let mut forms = Vec::with_capacity(2);
    if let Ok(absolute) = std::path::absolute(path) {
        forms.push(absolute);
    }
    let canonical = normalize_path(path);
    if !forms.contains(&canonical) {
        forms.push(canonical);
    }
    forms
}

fn root_forms(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots.iter().flat_map(|r| path_forms(r)).collect()
}

fn within_forms(path: &Path, root_forms: &[PathBuf]) -> bool {
    path_forms(path)
        .iter()
        .any(|form| is_under_any_root(form, root_forms))
}

/// Whether a stored path lies under any of `roots`.
pub fn is_within_roots(path: &Path, roots: &[PathBuf]) -> bool {
    within_forms(path, &root_forms(roots))
}

/// Delete every record whose path is outside all of `roots`.
///
/// An empty `roots` list orphans every record. Each orphan's thumbnail is
/// removed from `thumbnail_dir` before its record; failures there are
/// collected in the report and do not stop the record deletion. If the
/// deletion transaction fails, nothing is removed and the failure is the only
/// error reported.
pub fn reconcile_orphans(
    conn: &Connection,
    roots: &[PathBuf],
    thumbnail_dir: &Path,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    let records = match videos::list_videos(conn) {
        Ok(records) => records,
        Err(e) => {
            report.errors.push(format!("Failed to list videos: {e}"));
            return report;
        }
    };

    let forms = root_forms(roots);
    let orphans: Vec<_> = records
        .into_iter()
        .filter(|v| !within_forms(Path::new(&v.path), &forms))
        .collect();

    if orphans.is_empty() {
        tracing::info!("No orphaned videos found");
        return report;
    }
    tracing::info!(orphans = orphans.len(), "Removing orphaned videos");

    let result = (|| -> Result<usize> {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        let mut removed = 0;
        for video in &orphans {
            let thumb = video
                .thumbnail_path
                .clone()
                .unwrap_or_else(|| thumbnail_file_name(video.id));
            if let Err(e) = remove_if_exists(&thumbnail_dir.join(&thumb)) {
                tracing::warn!(id = %video.id, thumbnail = %thumb, error = %e, "Failed to delete thumbnail");
                report
                    .errors
                    .push(format!("Failed to delete thumbnail {thumb}: {e}"));
            }
            if videos::delete_video(&tx, video.id)? {
                removed += 1;
            }
            tracing::debug!(id = %video.id, path = %video.path, "Removed orphaned video");
        }
        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        Ok(removed)
    })();

    match result {
        Ok(removed) => report.removed = removed,
        Err(e) => {
            tracing::error!(error = %e, "Orphan cleanup rolled back");
            report.removed = 0;
            report.errors = vec![format!("Database commit failed, no videos removed: {e}")];
        }
    }

    tracing::info!(removed = report.removed, errors = report.errors.len(), "{}", report.message());
    report
}

fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Delete thumbnail files in `dir` that no record references.
///
/// Only files following the thumbnail naming convention are touched. A
/// missing directory sweeps nothing. Returns the number of files deleted.
pub fn sweep_unreferenced_thumbnails(conn: &Connection, dir: &Path) -> Result<usize> {
    let referenced = videos::list_thumbnail_references(conn)?;

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut deleted = 0;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to read thumbnail entry");
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_thumbnail_file(&name) || referenced.contains(&name) {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                tracing::debug!(thumbnail = %name, "Deleted unreferenced thumbnail");
                deleted += 1;
            }
            Err(e) => tracing::warn!(thumbnail = %name, error = %e, "Failed to delete unreferenced thumbnail"),
        }
    }

    if deleted > 0 {
        tracing::info!(deleted, "Swept unreferenced thumbnails");
    }
    Ok(deleted)
}
