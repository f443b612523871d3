use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use nepenthe_av::{ThumbnailSettings, ToolPaths};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Built web UI, served with an SPA fallback to `index.html`
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// Allowed CORS origins (empty = allow any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Root directories scanned for videos
    #[serde(default)]
    pub video_paths: Vec<PathBuf>,

    /// Directory holding the database and thumbnails
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_database_file")]
    pub database_file: String,

    #[serde(default = "default_thumbnails_dir_name")]
    pub thumbnails_dir_name: String,

    /// Also retry existing records with missing fields on every scan
    #[serde(default = "default_true")]
    pub heal_existing_on_scan: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_database_file() -> String {
    "nepenthe_videos.db".to_string()
}
fn default_thumbnails_dir_name() -> String {
    "thumbnails".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            video_paths: Vec::new(),
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            thumbnails_dir_name: default_thumbnails_dir_name(),
            heal_existing_on_scan: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default = "default_tool_timeout")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_tool_timeout")]
    pub thumbnail_timeout_secs: u64,

    /// Seek position of the thumbnail frame
    #[serde(default = "default_thumbnail_offset")]
    pub thumbnail_offset: String,

    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,
}

fn default_tool_timeout() -> u64 {
    60
}
fn default_thumbnail_offset() -> String {
    "00:00:03".to_string()
}
fn default_thumbnail_width() -> u32 {
    320
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: None,
            ffmpeg_path: None,
            probe_timeout_secs: default_tool_timeout(),
            thumbnail_timeout_secs: default_tool_timeout(),
            thumbnail_offset: default_thumbnail_offset(),
            thumbnail_width: default_thumbnail_width(),
        }
    }
}

impl ToolsConfig {
    /// Resolve tool executables. Call once at startup.
    pub fn resolve_paths(&self) -> ToolPaths {
        ToolPaths::resolve(self.ffprobe_path.as_deref(), self.ffmpeg_path.as_deref())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn thumbnail_settings(&self) -> ThumbnailSettings {
        ThumbnailSettings {
            offset: self.thumbnail_offset.clone(),
            width: self.thumbnail_width,
            timeout: Duration::from_secs(self.thumbnail_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Records probed and thumbnailed concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    2
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}
