//! End-to-end ingestion runs against a real SQLite file and the fake tools.

mod common;

use assert_matches::assert_matches;
use common::{TestHarness, FAKE_METADATA};
use nepenthe::ingest::{IngestBusy, IngestError};
use nepenthe_common::VideoId;
use nepenthe_db::models::NewVideo;
use nepenthe_db::queries::videos;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn foreground_scan_fills_every_field() {
    let h = TestHarness::new();
    let path = h.add_file("deep/er/clip.avi", b"clip");

    let summary = h.ctx.ingest.run_scan(None, None).await.unwrap();
    assert_eq!(summary.new_records, 1);
    assert_eq!(summary.total_records, 1);
    assert!(summary.pipeline_changed);
    assert!(summary.finished_at.is_some());

    let video = videos::get_video_by_path(&h.conn(), &path.to_string_lossy())
        .unwrap()
        .unwrap();
    assert_eq!(video.name, "clip.avi");
    assert_eq!(video.duration, FAKE_METADATA.duration);
    assert_eq!(video.width, FAKE_METADATA.width);
    assert!(!video.needs_processing());
    assert!(h.thumbnails().join(video.thumbnail_path.unwrap()).is_file());
}

#[tokio::test]
async fn healing_retries_incomplete_records() {
    let h = TestHarness::new();
    let path = h.add_file("old.mp4", b"old");
    videos::insert_videos(
        &h.conn(),
        &[NewVideo::new("old.mp4", path.to_string_lossy(), h.library.to_string_lossy())],
    )
    .unwrap();

    let summary = h.ctx.ingest.run_scan(None, Some(false)).await.unwrap();
    assert_eq!(summary.new_records, 0);
    assert!(!summary.pipeline_changed);
    assert_eq!(h.prober.calls.load(Ordering::SeqCst), 0);

    let summary = h.ctx.ingest.run_scan(None, Some(true)).await.unwrap();
    assert!(summary.pipeline_changed);
    let video = videos::get_video_by_path(&h.conn(), &path.to_string_lossy())
        .unwrap()
        .unwrap();
    assert!(!video.needs_processing());

    // Complete records are not probed again.
    let calls = h.prober.calls.load(Ordering::SeqCst);
    let summary = h.ctx.ingest.run_scan(None, Some(true)).await.unwrap();
    assert!(!summary.pipeline_changed);
    assert_eq!(h.prober.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn existing_thumbnail_file_is_adopted() {
    let h = TestHarness::new();
    h.add_file("a.mp4", b"a");
    std::fs::write(h.thumbnails().join("video_1.jpg"), b"already here").unwrap();

    h.ctx.ingest.run_scan(None, None).await.unwrap();

    let video = videos::get_video(&h.conn(), VideoId::from(1)).unwrap().unwrap();
    assert_eq!(video.thumbnail_path.as_deref(), Some("video_1.jpg"));
    assert_eq!(
        std::fs::read(h.thumbnails().join("video_1.jpg")).unwrap(),
        b"already here"
    );
}

#[tokio::test]
async fn scan_drops_records_from_removed_roots() {
    let h = TestHarness::new();
    let other = h.root().join("other");
    std::fs::create_dir_all(&other).unwrap();
    std::fs::write(other.join("b.mp4"), b"b").unwrap();
    h.add_file("a.mp4", b"a");

    let summary = h
        .ctx
        .ingest
        .run_scan(Some(vec![h.library.clone(), other.clone()]), None)
        .await
        .unwrap();
    assert_eq!(summary.total_records, 2);

    // Scanning only the library root reconciles the other root away.
    let summary = h
        .ctx
        .ingest
        .run_scan(Some(vec![h.library.clone()]), None)
        .await
        .unwrap();
    assert_eq!(summary.orphans_removed, 1);
    assert_eq!(summary.total_records, 1);
    assert_eq!(videos::count_videos(&h.conn()).unwrap(), 1);

    let thumbs: Vec<_> = std::fs::read_dir(h.thumbnails())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(thumbs.len(), 1);
}

#[tokio::test]
async fn missing_root_is_skipped() {
    let h = TestHarness::new();
    h.add_file("a.mp4", b"a");
    let missing = h.root().join("not-there");

    let summary = h
        .ctx
        .ingest
        .run_scan(Some(vec![h.library.clone(), missing]), None)
        .await
        .unwrap();
    assert!(summary.error.is_none());
    assert_eq!(summary.new_records, 1);
}

#[tokio::test]
async fn foreground_scan_is_rejected_while_busy() {
    let h = TestHarness::gated();
    h.add_file("a.mp4", b"a");

    h.ctx.ingest.trigger_scan(None, None).unwrap();
    assert_matches!(
        h.ctx.ingest.run_scan(None, None).await,
        Err(IngestError::Busy(IngestBusy))
    );

    h.open_gate();
    h.wait_idle().await;
    let last = h.ctx.ingest.last_summary().unwrap();
    assert_eq!(last.new_records, 1);
}
