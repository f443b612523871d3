//! Range-aware video streaming.
//!
//! Serves a stored video's bytes with `Accept-Ranges: bytes`. A single
//! `Range` gets a 206 with exactly the requested bytes, no `Range` gets the
//! whole file, and an unusable range gets a 416 carrying the file size.
//! Bytes are read sequentially from the computed offset in bounded chunks on
//! tokio's blocking-aware file API.

mod range;

pub use range::{parse_range, ByteRange, RangeError};

use std::io::SeekFrom;
use std::path::Path as FsPath;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use nepenthe_common::{Error, VideoId};
use nepenthe_db::pool::get_conn;
use nepenthe_db::queries::videos;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::server::{AppContext, AppError};

/// Bytes read from disk per body chunk.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// GET /api/stream/:id
pub async fn stream_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let id: VideoId = id
        .parse()
        .map_err(|_| Error::not_found(format!("video {id}")))?;

    let pool = ctx.pool.clone();
    let video = tokio::task::spawn_blocking(move || {
        let conn = get_conn(&pool)?;
        videos::get_video(&conn, id)
    })
    .await
    .map_err(|e| Error::internal(format!("lookup task failed: {e}")))??
    .ok_or_else(|| Error::not_found(format!("video {id}")))?;

    let range = headers
        .get(header::RANGE)
        .map(|h| h.to_str().unwrap_or("<non-ascii>"));

    serve_file(FsPath::new(&video.path), range).await
}

/// Build the streaming response for `path`.
pub async fn serve_file(path: &FsPath, range: Option<&str>) -> Result<Response, AppError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Err(Error::not_found(format!("file {}", path.display())).into()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::not_found(format!("file {}", path.display())).into())
        }
        Err(e) => return Err(Error::Io(e).into()),
    };
    let file_size = metadata.len();
    let content_type = content_type_for(path);

    let range = match range.map(|h| parse_range(h, file_size)).transpose() {
        Ok(range) => range,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Rejecting range request");
            return Ok(range_not_satisfiable(file_size));
        }
    };

    let mut file = File::open(path).await.map_err(Error::Io)?;

    let (status, length) = match range {
        Some(r) => {
            file.seek(SeekFrom::Start(r.start)).await.map_err(Error::Io)?;
            (StatusCode::PARTIAL_CONTENT, r.byte_count())
        }
        None => (StatusCode::OK, file_size),
    };

    let stream = TrackedStream::new(
        ReaderStream::with_capacity(file.take(length), CHUNK_SIZE),
        path.display().to_string(),
        length,
    );

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, length.to_string())
        .header(header::ACCEPT_RANGES, "bytes");
    if let Some(r) = range {
        builder = builder.header(header::CONTENT_RANGE, r.content_range(file_size));
    }

    builder
        .body(Body::from_stream(stream))
        .map_err(|e| Error::internal(e.to_string()).into())
}

fn range_not_satisfiable(file_size: u64) -> Response {
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [
            (header::CONTENT_RANGE, format!("bytes */{file_size}")),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
    )
        .into_response()
}

/// Media type for a file, from its extension.
pub fn content_type_for(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "flv" => "video/x-flv",
        "ts" | "m2ts" => "video/mp2t",
        _ => "application/octet-stream",
    }
}

/// Body stream that logs how a transfer ended.
///
/// Read errors are logged and passed on, which aborts the response. A stream
/// dropped before all bytes were sent means the client went away, which is
/// only worth a debug line.
struct TrackedStream<S> {
    inner: S,
    label: String,
    expected: u64,
    sent: u64,
    failed: bool,
}

impl<S> TrackedStream<S> {
    fn new(inner: S, label: String, expected: u64) -> Self {
        Self {
            inner,
            label,
            expected,
            sent: 0,
            failed: false,
        }
    }
}

impl<S> Stream for TrackedStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.failed = true;
                tracing::error!(file = %this.label, sent = this.sent, error = %e, "Read error while streaming");
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}

impl<S> Drop for TrackedStream<S> {
    fn drop(&mut self) {
        if !self.failed && self.sent < self.expected {
            tracing::debug!(
                file = %self.label,
                sent = self.sent,
                expected = self.expected,
                "Stream ended early, client disconnected"
            );
        }
    }
}
