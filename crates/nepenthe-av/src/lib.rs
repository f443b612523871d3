//! # nepenthe-av
//!
//! External media tool integration for nepenthe.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolPaths`]) -- resolve ffprobe and ffmpeg once,
//!   from explicit configuration or `PATH`.
//! - **Command execution** ([`ToolCommand`]) -- async builder with a hard
//!   timeout; the child process is killed when the timeout fires.
//! - **Metadata probing** ([`MetadataProbe`], [`FfprobeProber`]) -- duration
//!   and frame size of a video file.
//! - **Thumbnail extraction** ([`ThumbnailSource`], [`FfmpegThumbnailer`]) --
//!   one scaled JPEG frame per video.

pub mod command;
pub mod error;
pub mod probe;
pub mod thumbnail;
pub mod tools;

pub use command::{ToolCommand, ToolOutput};
pub use error::{Error, Result};
pub use probe::{FfprobeProber, MetadataProbe, VideoMetadata};
pub use thumbnail::{FfmpegThumbnailer, ThumbnailSettings, ThumbnailSource};
pub use tools::{check_tools, ToolInfo, ToolPaths};
