//! Typed ID wrapper for video records.
//!
//! Storage assigns an integer key when a record is first inserted; the key is
//! stable for the record's lifetime and also names its thumbnail file.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Unique identifier for a video record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(i64);

impl VideoId {
    /// The raw integer key.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for VideoId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<VideoId> for i64 {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

impl FromStr for VideoId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
