//! Internal Rust models matching the database schema.

use chrono::{DateTime, Utc};
use nepenthe_common::VideoId;
use serde::{Deserialize, Serialize};

/// One indexed video file, keyed by its absolute path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub id: VideoId,
    /// Display name (the file's base name when discovered by the scanner).
    pub name: String,
    /// Absolute file path, unique across all records.
    pub path: String,
    /// Library root the file was discovered under.
    pub folder: String,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Duration in whole seconds.
    pub duration: Option<i64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Thumbnail file name (not a path) inside the thumbnail directory.
    pub thumbnail_path: Option<String>,
    pub view_count: i64,
    pub rating: Option<f64>,
    pub studio: Option<String>,
}

/// Column list matching [`Video::from_row`].
pub(crate) const VIDEO_COLUMNS: &str = "id, name, path, folder, added_at, updated_at, duration, \
     width, height, thumbnail_path, view_count, rating, studio";

impl Video {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: VideoId::from(row.get::<_, i64>(0)?),
            name: row.get(1)?,
            path: row.get(2)?,
            folder: row.get(3)?,
            added_at: parse_timestamp(row, 4)?,
            updated_at: parse_timestamp(row, 5)?,
            duration: row.get(6)?,
            width: row.get(7)?,
            height: row.get(8)?,
            thumbnail_path: row.get(9)?,
            view_count: row.get(10)?,
            rating: row.get(11)?,
            studio: row.get(12)?,
        })
    }

    /// Whether any of duration, width, or height is absent.
    pub fn is_missing_metadata(&self) -> bool {
        self.duration.is_none() || self.width.is_none() || self.height.is_none()
    }

    /// Whether the metadata/thumbnail pipeline has anything left to fill in.
    pub fn needs_processing(&self) -> bool {
        self.is_missing_metadata() || self.thumbnail_path.is_none()
    }
}

fn parse_timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// A video discovered on disk that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVideo {
    pub name: String,
    pub path: String,
    pub folder: String,
}

impl NewVideo {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            folder: folder.into(),
        }
    }
}

/// Pipeline-derived fields to write back to a record.
///
/// `None` means "leave the stored value alone"; an update never clears a
/// populated field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoFieldUpdate {
    pub duration: Option<i64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub thumbnail_path: Option<String>,
}

impl VideoFieldUpdate {
    /// True when the update would not change anything.
    pub fn is_empty(&self) -> bool {
        self.duration.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.thumbnail_path.is_none()
    }
}
