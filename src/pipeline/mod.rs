//! Metadata and thumbnail pipeline.
//!
//! Fills in duration, frame size, and thumbnail for records that lack them.
//! Tool failures only leave the affected fields absent; a later run retries.
//! Field updates for one pass are committed in a single transaction at the
//! end of the pass.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use nepenthe_av::{MetadataProbe, ThumbnailSource};
use nepenthe_common::paths::thumbnail_file_name;
use nepenthe_common::{Error, Result, VideoId};
use nepenthe_db::models::{Video, VideoFieldUpdate};
use nepenthe_db::pool::{get_conn, DbPool};
use nepenthe_db::queries::videos;
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Pick the records a pass should work on.
///
/// Newly discovered records always qualify when they need anything. With
/// `heal_existing`, every stored record with an absent field is added too.
pub fn select_records(
    conn: &Connection,
    new_records: Vec<Video>,
    heal_existing: bool,
) -> Result<Vec<Video>> {
    let mut selected: Vec<Video> = new_records
        .into_iter()
        .filter(Video::needs_processing)
        .collect();

    if heal_existing {
        let mut seen: std::collections::HashSet<VideoId> =
            selected.iter().map(|v| v.id).collect();
        for video in videos::list_videos_missing_metadata_or_thumbnail(conn)? {
            if seen.insert(video.id) {
                selected.push(video);
            }
        }
    }

    Ok(selected)
}

/// Drives the prober and thumbnailer over a set of records.
#[derive(Clone)]
pub struct Pipeline {
    pool: DbPool,
    prober: Arc<dyn MetadataProbe>,
    thumbnailer: Arc<dyn ThumbnailSource>,
    thumbnail_dir: PathBuf,
    workers: usize,
}

impl Pipeline {
    pub fn new(
        pool: DbPool,
        prober: Arc<dyn MetadataProbe>,
        thumbnailer: Arc<dyn ThumbnailSource>,
        thumbnail_dir: PathBuf,
        workers: usize,
    ) -> Self {
        Self {
            pool,
            prober,
            thumbnailer,
            thumbnail_dir,
            workers: workers.max(1),
        }
    }

    /// Process `records` and commit whatever was learned.
    ///
    /// At most `workers` records are in flight at once. `cancel` is checked
    /// before each record starts; records already finished are still
    /// committed. Returns whether any stored record changed.
    pub async fn process(&self, records: Vec<Video>, cancel: &CancellationToken) -> Result<bool> {
        if records.is_empty() {
            return Ok(false);
        }
        tracing::info!(records = records.len(), workers = self.workers, "Processing metadata and thumbnails");

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(records.len());

        for video in records {
            let sem = semaphore.clone();
            let cancel = cancel.clone();
            let worker = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok()?;
                if cancel.is_cancelled() {
                    return None;
                }
                let update = worker.process_record(&video).await;
                (!update.is_empty()).then_some((video.id, update))
            }));
        }

        let mut updates = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Some(update)) => updates.push(update),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Pipeline task panicked"),
            }
        }

        if cancel.is_cancelled() {
            tracing::info!(completed = updates.len(), "Pipeline cancelled, committing finished records");
        }
        if updates.is_empty() {
            return Ok(false);
        }

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || commit_updates(&pool, &updates))
            .await
            .map_err(|e| Error::internal(format!("pipeline commit task failed: {e}")))?
    }

    /// Work out the field update for one record. Never fails.
    async fn process_record(&self, video: &Video) -> VideoFieldUpdate {
        let path = Path::new(&video.path);
        let mut update = VideoFieldUpdate::default();

        if video.is_missing_metadata() {
            match self.prober.probe(path).await {
                Ok(meta) => {
                    update.duration = meta.duration.filter(|d| video.duration != Some(*d));
                    update.width = meta.width.filter(|w| video.width != Some(*w));
                    update.height = meta.height.filter(|h| video.height != Some(*h));
                    if meta.is_empty() {
                        tracing::debug!(id = %video.id, path = %path.display(), "Probe returned no metadata");
                    }
                }
                Err(e) => {
                    tracing::warn!(id = %video.id, path = %path.display(), error = %e, "Metadata probe failed");
                }
            }
        }

        if video.thumbnail_path.is_none() {
            update.thumbnail_path = self.thumbnail_for(video, path).await;
        }

        update
    }

    /// Adopt an existing non-empty thumbnail or generate a new one.
    async fn thumbnail_for(&self, video: &Video, path: &Path) -> Option<String> {
        let expected = thumbnail_file_name(video.id);
        if let Ok(meta) = tokio::fs::metadata(self.thumbnail_dir.join(&expected)).await {
            if meta.is_file() && meta.len() > 0 {
                tracing::debug!(id = %video.id, thumbnail = %expected, "Adopting existing thumbnail");
                return Some(expected);
            }
        }

        match self
            .thumbnailer
            .generate(path, video.id, &self.thumbnail_dir)
            .await
        {
            Ok(name) => Some(name),
            Err(e) => {
                tracing::warn!(id = %video.id, path = %path.display(), error = %e, "Thumbnail generation failed");
                None
            }
        }
    }
}

fn commit_updates(pool: &DbPool, updates: &[(VideoId, VideoFieldUpdate)]) -> Result<bool> {
    let conn = get_conn(pool)?;
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let mut changed = 0usize;
    for (id, update) in updates {
        if videos::update_video_fields(&tx, *id, update)? {
            changed += 1;
        }
    }

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    tracing::info!(changed, "Committed pipeline updates");
    Ok(changed > 0)
}
