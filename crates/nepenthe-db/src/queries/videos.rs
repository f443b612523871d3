//! Video record operations.

use std::collections::HashSet;

use chrono::Utc;
use nepenthe_common::{Error, Result, VideoId};
use rusqlite::{Connection, OptionalExtension};

use crate::models::{NewVideo, Video, VideoFieldUpdate, VIDEO_COLUMNS};

/// Get a video by ID.
pub fn get_video(conn: &Connection, id: VideoId) -> Result<Option<Video>> {
    conn.query_row(
        &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1"),
        [id.get()],
        Video::from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Get a video by its absolute path.
pub fn get_video_by_path(conn: &Connection, path: &str) -> Result<Option<Video>> {
    conn.query_row(
        &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE path = ?1"),
        [path],
        Video::from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Insert discovered videos, skipping any whose path is already stored.
///
/// Returns only the records that were actually created, in input order.
pub fn insert_videos(conn: &Connection, new_videos: &[NewVideo]) -> Result<Vec<Video>> {
    let mut stmt = conn
        .prepare(
            "INSERT OR IGNORE INTO videos (name, path, folder, added_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let mut inserted = Vec::new();
    for new in new_videos {
        let now = Utc::now();
        let n = stmt
            .execute(rusqlite::params![
                new.name,
                new.path,
                new.folder,
                now.to_rfc3339()
            ])
            .map_err(|e| Error::database(e.to_string()))?;
        if n == 0 {
            continue;
        }
        inserted.push(Video {
            id: VideoId::from(conn.last_insert_rowid()),
            name: new.name.clone(),
            path: new.path.clone(),
            folder: new.folder.clone(),
            added_at: now,
            updated_at: now,
            duration: None,
            width: None,
            height: None,
            thumbnail_path: None,
            view_count: 0,
            rating: None,
            studio: None,
        });
    }
    Ok(inserted)
}

/// Fill in pipeline-derived fields.
///
/// Absent values in `update` keep whatever is stored. Returns `false` when
/// the update is empty or the record no longer exists.
pub fn update_video_fields(
    conn: &Connection,
    id: VideoId,
    update: &VideoFieldUpdate,
) -> Result<bool> {
    if update.is_empty() {
        return Ok(false);
    }
    let n = conn
        .execute(
            "UPDATE videos SET
                duration = COALESCE(?1, duration),
                width = COALESCE(?2, width),
                height = COALESCE(?3, height),
                thumbnail_path = COALESCE(?4, thumbnail_path),
                updated_at = ?5
             WHERE id = ?6",
            rusqlite::params![
                update.duration,
                update.width,
                update.height,
                update.thumbnail_path,
                Utc::now().to_rfc3339(),
                id.get()
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Delete a video record.
pub fn delete_video(conn: &Connection, id: VideoId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM videos WHERE id = ?1", [id.get()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// List all videos, newest first.
pub fn list_videos(conn: &Connection) -> Result<Vec<Video>> {
    query_videos(
        conn,
        &format!("SELECT {VIDEO_COLUMNS} FROM videos ORDER BY id DESC"),
    )
}

/// Videos lacking any of duration, width, height, or a thumbnail.
pub fn list_videos_missing_metadata_or_thumbnail(conn: &Connection) -> Result<Vec<Video>> {
    query_videos(
        conn,
        &format!(
            "SELECT {VIDEO_COLUMNS} FROM videos
             WHERE duration IS NULL OR width IS NULL OR height IS NULL
                OR thumbnail_path IS NULL
             ORDER BY id"
        ),
    )
}

/// ID and stored path of every record.
pub fn list_video_paths(conn: &Connection) -> Result<Vec<(VideoId, String)>> {
    let mut stmt = conn
        .prepare("SELECT id, path FROM videos ORDER BY id")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| Ok((VideoId::from(row.get::<_, i64>(0)?), row.get(1)?)))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Thumbnail file names referenced by at least one record.
pub fn list_thumbnail_references(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT thumbnail_path FROM videos WHERE thumbnail_path IS NOT NULL")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<HashSet<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Total number of records.
pub fn count_videos(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

fn query_videos(conn: &Connection, sql: &str) -> Result<Vec<Video>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Video::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}
