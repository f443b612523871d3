//! Metadata probing.

mod ffprobe;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use ffprobe::{parse_ffprobe_json, FfprobeProber};

/// Technical metadata extracted from one video file.
///
/// Each field is independently optional: a probe that could read the
/// container duration but found no video stream still yields a duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Container duration in whole seconds.
    pub duration: Option<i64>,
    /// Width of the first video stream.
    pub width: Option<u32>,
    /// Height of the first video stream.
    pub height: Option<u32>,
}

impl VideoMetadata {
    pub fn is_empty(&self) -> bool {
        self.duration.is_none() && self.width.is_none() && self.height.is_none()
    }
}

/// Something that can extract [`VideoMetadata`] from a file.
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    /// Probe `path`.
    ///
    /// Returns an error when the tool itself could not produce usable output
    /// (missing binary, non-zero exit, timeout, unparseable output). Missing
    /// or malformed individual fields are not errors.
    async fn probe(&self, path: &Path) -> Result<VideoMetadata>;
}
