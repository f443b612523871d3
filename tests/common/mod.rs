//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a temp directory holding the
//! database, thumbnails, and a library root, plus a full [`AppContext`] wired
//! to fake prober and thumbnailer implementations. [`TestHarness::with_server`]
//! starts Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nepenthe::config::{Config, DataPaths};
use nepenthe::server::{create_router, AppContext};
use nepenthe_av::{MetadataProbe, ThumbnailSource, VideoMetadata};
use nepenthe_common::paths::thumbnail_file_name;
use nepenthe_common::VideoId;
use nepenthe_db::pool::{get_conn, init_pool, PooledConnection};
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// Metadata every fake probe reports.
pub const FAKE_METADATA: VideoMetadata = VideoMetadata {
    duration: Some(42),
    width: Some(1280),
    height: Some(720),
};

/// Permits of an open gate; probes release theirs when done.
const OPEN_PERMITS: usize = 1 << 20;

/// Prober that reports [`FAKE_METADATA`] once the gate lets it through.
pub struct FakeProbe {
    gate: Arc<Semaphore>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl MetadataProbe for FakeProbe {
    async fn probe(&self, path: &Path) -> nepenthe_av::Result<VideoMetadata> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| nepenthe_av::Error::tool_failed("ffprobe", e.to_string()))?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !path.exists() {
            return Err(nepenthe_av::Error::file_not_found(path));
        }
        Ok(FAKE_METADATA)
    }
}

/// Thumbnailer that writes a small placeholder JPEG.
pub struct FakeThumbs;

#[async_trait]
impl ThumbnailSource for FakeThumbs {
    async fn generate(
        &self,
        source: &Path,
        id: VideoId,
        dest_dir: &Path,
    ) -> nepenthe_av::Result<String> {
        if !source.exists() {
            return Err(nepenthe_av::Error::file_not_found(source));
        }
        let name = thumbnail_file_name(id);
        tokio::fs::write(dest_dir.join(&name), b"\xff\xd8fake\xff\xd9").await?;
        Ok(name)
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub prober: Arc<FakeProbe>,
    /// Configured library root, created empty.
    pub library: PathBuf,
    gate: Arc<Semaphore>,
    dir: TempDir,
}

impl TestHarness {
    /// Harness whose prober answers immediately.
    pub fn new() -> Self {
        Self::build(OPEN_PERMITS)
    }

    /// Harness whose prober blocks until [`TestHarness::open_gate`].
    pub fn gated() -> Self {
        Self::build(0)
    }

    fn build(permits: usize) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let library = dir.path().join("library");
        std::fs::create_dir_all(&library).expect("failed to create library root");
        // Stored paths are canonical, so compare against the canonical root.
        let library = std::fs::canonicalize(&library).expect("failed to canonicalize root");

        let mut config = Config::default();
        config.library.data_dir = dir.path().join("data");
        config.library.video_paths = vec![library.clone()];

        let paths = Arc::new(DataPaths::resolve(&config.library).expect("failed to resolve paths"));
        let pool = init_pool(&paths.database_str()).expect("failed to open database");

        let gate = Arc::new(Semaphore::new(permits));
        let prober = Arc::new(FakeProbe {
            gate: gate.clone(),
            calls: AtomicUsize::new(0),
        });

        let ctx = AppContext::new(config, paths, pool, prober.clone(), Arc::new(FakeThumbs));

        Self {
            ctx,
            prober,
            library,
            gate,
            dir,
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }

    /// Like [`TestHarness::with_server`], with a gated prober.
    pub async fn with_gated_server() -> (Self, SocketAddr) {
        Self::gated().serve().await
    }

    async fn serve(self) -> (Self, SocketAddr) {
        let app = create_router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }

    /// Let blocked probes through, now and from here on.
    pub fn open_gate(&self) {
        self.gate.add_permits(OPEN_PERMITS);
    }

    /// Root of the temp directory, outside the library root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn thumbnails(&self) -> &Path {
        &self.ctx.paths.thumbnails
    }

    /// Write a file under the library root and return its path.
    pub fn add_file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.library.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(&path, contents).expect("failed to write file");
        path
    }

    /// Get a database connection from the pool.
    pub fn conn(&self) -> PooledConnection {
        get_conn(&self.ctx.pool).expect("failed to get db connection")
    }

    /// Wait for a background ingestion unit to finish.
    pub async fn wait_idle(&self) {
        for _ in 0..500 {
            if !self.ctx.ingest.is_running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("ingestion did not finish in time");
    }
}
