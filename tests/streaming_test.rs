//! Integration tests for `GET /api/stream/:id`.

mod common;

use common::TestHarness;
use nepenthe_db::models::NewVideo;
use nepenthe_db::queries::videos;
use std::path::Path;

/// 1000 bytes with a recognisable pattern.
fn payload() -> Vec<u8> {
    (0..1000u32).map(|i| (i % 251) as u8).collect()
}

fn index(h: &TestHarness, path: &Path) -> i64 {
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    let added = videos::insert_videos(
        &h.conn(),
        &[NewVideo::new(
            name,
            path.to_string_lossy(),
            h.library.to_string_lossy(),
        )],
    )
    .unwrap();
    added[0].id.into()
}

#[tokio::test]
async fn full_request_returns_whole_file() {
    let (h, addr) = TestHarness::with_server().await;
    let path = h.add_file("clip.mp4", &payload());
    let id = index(&h, &path);

    let resp = reqwest::get(format!("http://{addr}/api/stream/{id}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let headers = resp.headers();
    assert_eq!(headers["content-type"], "video/mp4");
    assert_eq!(headers["accept-ranges"], "bytes");
    assert_eq!(headers["content-length"], "1000");
    assert!(headers.get("content-range").is_none());

    let body = resp.bytes().await.unwrap();
    assert_eq!(body.as_ref(), payload().as_slice());
}

#[tokio::test]
async fn closed_range_returns_partial_content() {
    let (h, addr) = TestHarness::with_server().await;
    let path = h.add_file("clip.mkv", &payload());
    let id = index(&h, &path);

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/api/stream/{id}"))
        .header("Range", "bytes=100-199")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-type"], "video/x-matroska");
    assert_eq!(resp.headers()["content-range"], "bytes 100-199/1000");
    assert_eq!(resp.headers()["content-length"], "100");

    let body = resp.bytes().await.unwrap();
    assert_eq!(body.as_ref(), &payload()[100..200]);
}

#[tokio::test]
async fn open_ended_and_overlong_ranges_stop_at_end_of_file() {
    let (h, addr) = TestHarness::with_server().await;
    let path = h.add_file("clip.webm", &payload());
    let id = index(&h, &path);
    let client = reqwest::Client::new();

    for range in ["bytes=900-", "bytes=900-5000"] {
        let resp = client
            .get(format!("http://{addr}/api/stream/{id}"))
            .header("Range", range)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 206, "{range}");
        assert_eq!(resp.headers()["content-range"], "bytes 900-999/1000");
        let body = resp.bytes().await.unwrap();
        assert_eq!(body.as_ref(), &payload()[900..]);
    }
}

#[tokio::test]
async fn missing_start_counts_from_zero() {
    let (h, addr) = TestHarness::with_server().await;
    let path = h.add_file("clip.mp4", &payload());
    let id = index(&h, &path);

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/api/stream/{id}"))
        .header("Range", "bytes=-9")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-range"], "bytes 0-9/1000");
    assert_eq!(resp.bytes().await.unwrap().len(), 10);
}

#[tokio::test]
async fn range_unit_ignores_case() {
    let (h, addr) = TestHarness::with_server().await;
    let path = h.add_file("clip.mp4", &payload());
    let id = index(&h, &path);

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/api/stream/{id}"))
        .header("Range", "Bytes=100-199")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-range"], "bytes 100-199/1000");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), &payload()[100..200]);
}

#[tokio::test]
async fn unsatisfiable_ranges_return_416() {
    let (h, addr) = TestHarness::with_server().await;
    let path = h.add_file("clip.mp4", &payload());
    let id = index(&h, &path);
    let client = reqwest::Client::new();

    for range in ["bytes=1000-", "bytes=500-100", "items=0-1", "bytes=abc"] {
        let resp = client
            .get(format!("http://{addr}/api/stream/{id}"))
            .header("Range", range)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 416, "{range}");
        assert_eq!(resp.headers()["content-range"], "bytes */1000");
    }
}

#[tokio::test]
async fn unknown_or_missing_files_return_404() {
    let (h, addr) = TestHarness::with_server().await;

    let resp = reqwest::get(format!("http://{addr}/api/stream/12345"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = reqwest::get(format!("http://{addr}/api/stream/not-a-number"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let path = h.add_file("gone.mp4", b"data");
    let id = index(&h, &path);
    std::fs::remove_file(&path).unwrap();

    let resp = reqwest::get(format!("http://{addr}/api/stream/{id}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "not_found");
}
