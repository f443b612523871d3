//! Read-only video listing routes.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use nepenthe_common::{Error, VideoId};
use nepenthe_db::models::Video;
use nepenthe_db::pool::get_conn;
use nepenthe_db::queries::videos;
use serde::Serialize;

use super::{AppContext, AppError};
use crate::streaming;

/// URL prefix thumbnails are served under.
pub const THUMBNAIL_URL_PREFIX: &str = "/static/thumbnails";

pub fn video_routes() -> Router<AppContext> {
    Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/:id", get(get_video))
        .route("/stream/:id", get(streaming::stream_video))
}

/// A record as returned by the API.
#[derive(Debug, Serialize)]
pub struct VideoResponse {
    #[serde(flatten)]
    pub video: Video,
    pub thumbnail_url: Option<String>,
}

impl From<Video> for VideoResponse {
    fn from(video: Video) -> Self {
        let thumbnail_url = video
            .thumbnail_path
            .as_ref()
            .map(|name| format!("{THUMBNAIL_URL_PREFIX}/{name}"));
        Self {
            video,
            thumbnail_url,
        }
    }
}

/// GET /api/videos
async fn list_videos(State(ctx): State<AppContext>) -> Result<Json<Vec<VideoResponse>>, AppError> {
    let pool = ctx.pool.clone();
    let all = tokio::task::spawn_blocking(move || {
        let conn = get_conn(&pool)?;
        videos::list_videos(&conn)
    })
    .await
    .map_err(|e| Error::internal(e.to_string()))??;

    Ok(Json(all.into_iter().map(VideoResponse::from).collect()))
}

/// GET /api/videos/:id
async fn get_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<VideoResponse>, AppError> {
    let id: VideoId = id
        .parse()
        .map_err(|_| Error::not_found(format!("video {id}")))?;

    let pool = ctx.pool.clone();
    let video = tokio::task::spawn_blocking(move || {
        let conn = get_conn(&pool)?;
        videos::get_video(&conn, id)
    })
    .await
    .map_err(|e| Error::internal(e.to_string()))??
    .ok_or_else(|| Error::not_found(format!("video {id}")))?;

    Ok(Json(video.into()))
}
