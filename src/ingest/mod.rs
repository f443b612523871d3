//! Ingestion coordinator.
//!
//! One ingestion unit runs reconcile, scan, pipeline, and thumbnail sweep in
//! that order. At most one unit (or one sync-and-clean) runs at a time; a
//! second request while one is in flight is rejected with [`IngestBusy`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nepenthe_av::{MetadataProbe, ThumbnailSource};
use nepenthe_db::pool::{get_conn, DbPool};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DataPaths};
use crate::pipeline::{select_records, Pipeline};
use crate::reconcile::{
    cleanup_message, reconcile_orphans, sweep_unreferenced_thumbnails, ReconcileReport,
};
use crate::scanner;

/// Returned when an ingestion unit is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a library scan or cleanup is already in progress")]
pub struct IngestBusy;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Busy(#[from] IngestBusy),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Settings the coordinator needs from the configuration.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Roots used when a request names none.
    pub default_roots: Vec<PathBuf>,
    pub heal_existing: bool,
    pub workers: usize,
}

impl From<&Config> for IngestSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_roots: config.library.video_paths.clone(),
            heal_existing: config.library.heal_existing_on_scan,
            workers: config.ingest.workers,
        }
    }
}

/// Acknowledgement for a background scan.
#[derive(Debug, Clone, Serialize)]
pub struct IngestTicket {
    pub roots: Vec<PathBuf>,
    pub heal_existing: bool,
    pub started_at: DateTime<Utc>,
}

/// What one ingestion unit did.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub roots: Vec<PathBuf>,
    pub orphans_removed: usize,
    pub reconcile_errors: Vec<String>,
    pub new_records: usize,
    pub total_records: i64,
    pub pipeline_changed: bool,
    pub thumbnails_swept: usize,
    pub cancelled: bool,
    /// Set when a stage failed and the unit stopped early.
    pub error: Option<String>,
}

impl IngestSummary {
    fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            roots,
            orphans_removed: 0,
            reconcile_errors: Vec::new(),
            new_records: 0,
            total_records: 0,
            pipeline_changed: false,
            thumbnails_swept: 0,
            cancelled: false,
            error: None,
        }
    }
}

/// Result of a sync-and-clean request.
#[derive(Debug, Clone, Serialize)]
pub struct CleanReport {
    pub removed: usize,
    pub errors: Vec<String>,
    pub thumbnails_swept: usize,
    pub message: String,
}

struct Inner {
    pool: DbPool,
    paths: Arc<DataPaths>,
    pipeline: Pipeline,
    settings: IngestSettings,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
    last: Mutex<Option<IngestSummary>>,
}

/// Clears the in-flight flag when the run ends, even on panic.
struct RunGuard {
    inner: Arc<Inner>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.inner.running.store(false, Ordering::Release);
    }
}

/// Serializes ingestion work and runs it off the request path.
#[derive(Clone)]
pub struct IngestCoordinator {
    inner: Arc<Inner>,
}

impl IngestCoordinator {
    pub fn new(
        pool: DbPool,
        paths: Arc<DataPaths>,
        prober: Arc<dyn MetadataProbe>,
        thumbnailer: Arc<dyn ThumbnailSource>,
        settings: IngestSettings,
    ) -> Self {
        let pipeline = Pipeline::new(
            pool.clone(),
            prober,
            thumbnailer,
            paths.thumbnails.clone(),
            settings.workers,
        );
        Self {
            inner: Arc::new(Inner {
                pool,
                paths,
                pipeline,
                settings,
                running: AtomicBool::new(false),
                cancel: Mutex::new(CancellationToken::new()),
                last: Mutex::new(None),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Summary of the most recently finished unit.
    pub fn last_summary(&self) -> Option<IngestSummary> {
        self.inner.last.lock().clone()
    }

    /// Ask the running unit to stop after the records already in progress.
    ///
    /// Returns `false` when nothing is running.
    pub fn cancel(&self) -> bool {
        let token = self.inner.cancel.lock();
        if !self.is_running() {
            return false;
        }
        tracing::info!("Cancelling library scan");
        token.cancel();
        true
    }

    /// Claim the guard and install a fresh token for the new run.
    ///
    /// Both happen under the token lock, so a concurrent [`cancel`] always
    /// reaches the run it saw as running.
    ///
    /// [`cancel`]: IngestCoordinator::cancel
    fn try_acquire(&self) -> Result<(RunGuard, CancellationToken), IngestBusy> {
        let mut current = self.inner.cancel.lock();
        self.inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| IngestBusy)?;
        let token = CancellationToken::new();
        *current = token.clone();
        drop(current);

        let guard = RunGuard {
            inner: self.inner.clone(),
        };
        Ok((guard, token))
    }

    fn effective_roots(&self, roots: Option<Vec<PathBuf>>) -> Vec<PathBuf> {
        match roots {
            Some(roots) if !roots.is_empty() => roots,
            _ => self.inner.settings.default_roots.clone(),
        }
    }

    /// Start an ingestion unit in the background and return immediately.
    ///
    /// `roots` falls back to the configured roots when absent or empty.
    pub fn trigger_scan(
        &self,
        roots: Option<Vec<PathBuf>>,
        heal_existing: Option<bool>,
    ) -> Result<IngestTicket, IngestBusy> {
        let (guard, token) = self.try_acquire()?;
        let roots = self.effective_roots(roots);
        let heal_existing = heal_existing.unwrap_or(self.inner.settings.heal_existing);

        let ticket = IngestTicket {
            roots: roots.clone(),
            heal_existing,
            started_at: Utc::now(),
        };

        self.spawn_unit(guard, roots, heal_existing, token);
        Ok(ticket)
    }

    /// Run an ingestion unit and wait for it.
    ///
    /// The unit runs on its own task, so dropping the returned future does
    /// not stop it or release the guard early.
    pub async fn run_scan(
        &self,
        roots: Option<Vec<PathBuf>>,
        heal_existing: Option<bool>,
    ) -> Result<IngestSummary, IngestError> {
        let (guard, token) = self.try_acquire()?;
        let roots = self.effective_roots(roots);
        let heal_existing = heal_existing.unwrap_or(self.inner.settings.heal_existing);

        let summary = self
            .spawn_unit(guard, roots, heal_existing, token)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(summary)
    }

    fn spawn_unit(
        &self,
        guard: RunGuard,
        roots: Vec<PathBuf>,
        heal_existing: bool,
        token: CancellationToken,
    ) -> JoinHandle<IngestSummary> {
        let this = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            let summary = this.run_unit(roots, heal_existing, token).await;
            *this.inner.last.lock() = Some(summary.clone());
            summary
        })
    }

    /// Remove records outside `roots`, then sweep unreferenced thumbnails.
    ///
    /// No scanning happens. An empty `roots` removes every record. The guard
    /// is held by the blocking task, so the run keeps it until the cleanup
    /// has finished even if the caller goes away.
    pub async fn sync_and_clean(&self, roots: Vec<PathBuf>) -> Result<CleanReport, IngestError> {
        let (guard, _token) = self.try_acquire()?;
        tracing::info!(roots = ?roots, "Starting library sync and cleanup");

        let pool = self.inner.pool.clone();
        let thumbs = self.inner.paths.thumbnails.clone();
        let report = tokio::task::spawn_blocking(move || -> anyhow::Result<CleanReport> {
            let _guard = guard;
            let conn = get_conn(&pool)?;
            let ReconcileReport {
                removed,
                mut errors,
            } = reconcile_orphans(&conn, &roots, &thumbs);
            let thumbnails_swept = match sweep_unreferenced_thumbnails(&conn, &thumbs) {
                Ok(n) => n,
                Err(e) => {
                    errors.push(format!("Thumbnail sweep failed: {e}"));
                    0
                }
            };
            let message = cleanup_message(removed, errors.len());
            Ok(CleanReport {
                removed,
                errors,
                thumbnails_swept,
                message,
            })
        })
        .await
        .map_err(anyhow::Error::from)??;

        Ok(report)
    }

    /// The unit of work itself. Callers hold the run guard.
    async fn run_unit(
        &self,
        roots: Vec<PathBuf>,
        heal_existing: bool,
        cancel: CancellationToken,
    ) -> IngestSummary {
        tracing::info!(roots = ?roots, heal_existing, "Starting library ingestion");
        let mut summary = IngestSummary::new(roots.clone());

        if let Err(e) = self
            .run_stages(&mut summary, roots, heal_existing, &cancel)
            .await
        {
            tracing::error!(error = %format!("{e:#}"), "Library ingestion failed");
            summary.error = Some(format!("{e:#}"));
        }

        summary.finished_at = Some(Utc::now());
        tracing::info!(
            orphans_removed = summary.orphans_removed,
            new_records = summary.new_records,
            total_records = summary.total_records,
            pipeline_changed = summary.pipeline_changed,
            thumbnails_swept = summary.thumbnails_swept,
            cancelled = summary.cancelled,
            "Library ingestion finished"
        );
        summary
    }

    async fn run_stages(
        &self,
        summary: &mut IngestSummary,
        roots: Vec<PathBuf>,
        heal_existing: bool,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let pool = self.inner.pool.clone();
        let thumbs = self.inner.paths.thumbnails.clone();

        let report = {
            let (pool, roots, thumbs) = (pool.clone(), roots.clone(), thumbs.clone());
            blocking(move || {
                let conn = get_conn(&pool)?;
                Ok(reconcile_orphans(&conn, &roots, &thumbs))
            })
            .await?
        };
        summary.orphans_removed = report.removed;
        summary.reconcile_errors = report.errors;

        if cancel.is_cancelled() {
            summary.cancelled = true;
            return Ok(());
        }

        let records = {
            let pool = pool.clone();
            blocking(move || {
                let conn = get_conn(&pool)?;
                let outcome = scanner::scan(&conn, &roots)?;
                let new_count = outcome.new_records.len();
                let total = outcome.total_records;
                let records = select_records(&conn, outcome.new_records, heal_existing)?;
                Ok((new_count, total, records))
            })
            .await?
        };
        let (new_records, total_records, records) = records;
        summary.new_records = new_records;
        summary.total_records = total_records;

        if cancel.is_cancelled() {
            summary.cancelled = true;
            return Ok(());
        }

        summary.pipeline_changed = self.inner.pipeline.process(records, cancel).await?;

        if cancel.is_cancelled() {
            summary.cancelled = true;
            return Ok(());
        }

        summary.thumbnails_swept = blocking(move || {
            let conn = get_conn(&pool)?;
            sweep_unreferenced_thumbnails(&conn, &thumbs)
        })
        .await?;

        Ok(())
    }
}

async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> nepenthe_common::Result<T> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}
