//! Thumbnail extraction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use nepenthe_common::paths::thumbnail_file_name;
use nepenthe_common::VideoId;

use crate::{Error, Result, ToolCommand};

/// Something that can write a preview image for a video.
#[async_trait]
pub trait ThumbnailSource: Send + Sync {
    /// Write a thumbnail for `source` into `dest_dir`, named after `id`.
    ///
    /// Returns the file name (not the full path) of the written thumbnail.
    async fn generate(&self, source: &Path, id: VideoId, dest_dir: &Path) -> Result<String>;
}

/// How thumbnails are cut from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailSettings {
    /// Seek position, in any form ffmpeg's `-ss` accepts.
    pub offset: String,
    /// Output width in pixels; height follows the aspect ratio.
    pub width: u32,
    pub timeout: Duration,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            offset: "00:00:03".to_string(),
            width: 320,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Thumbnail generator backed by the `ffmpeg` CLI.
#[derive(Debug, Clone)]
pub struct FfmpegThumbnailer {
    ffmpeg: PathBuf,
    settings: ThumbnailSettings,
}

impl FfmpegThumbnailer {
    pub fn new(ffmpeg: PathBuf, settings: ThumbnailSettings) -> Self {
        Self { ffmpeg, settings }
    }

    fn command(&self, source: &Path, output: &Path) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.arg("-ss")
            .arg(self.settings.offset.as_str())
            .arg("-i")
            .arg(source.to_string_lossy())
            .arg("-vframes")
            .arg("1")
            .arg("-vf")
            // -2 keeps the aspect ratio and an even height for yuvj420p.
            .arg(format!("scale={}:-2,format=yuvj420p", self.settings.width))
            .arg("-q:v")
            .arg("3")
            .arg("-y")
            .arg(output.to_string_lossy())
            .timeout(self.settings.timeout);
        cmd
    }
}

#[async_trait]
impl ThumbnailSource for FfmpegThumbnailer {
    async fn generate(&self, source: &Path, id: VideoId, dest_dir: &Path) -> Result<String> {
        if !dest_dir.is_dir() {
            return Err(Error::InvalidInput(format!(
                "thumbnail directory {} does not exist",
                dest_dir.display()
            )));
        }
        if !source.is_file() {
            return Err(Error::file_not_found(source));
        }

        let file_name = thumbnail_file_name(id);
        let output = dest_dir.join(&file_name);

        if let Err(e) = self.command(source, &output).execute().await {
            remove_partial(&output).await;
            return Err(e);
        }

        match tokio::fs::metadata(&output).await {
            Ok(meta) if meta.len() > 0 => Ok(file_name),
            Ok(_) => {
                remove_partial(&output).await;
                Err(Error::tool_failed("ffmpeg", "produced an empty thumbnail"))
            }
            Err(_) => Err(Error::tool_failed("ffmpeg", "produced no thumbnail")),
        }
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial thumbnail"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial thumbnail"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clip.mp4");
        std::fs::write(&source, b"video bytes").unwrap();
        let thumbs = dir.path().join("thumbnails");
        std::fs::create_dir(&thumbs).unwrap();
        (dir, source, thumbs)
    }

    #[test]
    fn command_line_shape() {
        let thumbnailer =
            FfmpegThumbnailer::new(PathBuf::from("ffmpeg"), ThumbnailSettings::default());
        let cmd = format!(
            "{:?}",
            thumbnailer.command(Path::new("/v/a.mp4"), Path::new("/t/video_1.jpg"))
        );
        assert!(cmd.contains("\"-ss\", \"00:00:03\""));
        assert!(cmd.contains("scale=320:-2,format=yuvj420p"));
        assert!(cmd.contains("\"/t/video_1.jpg\""));
    }

    #[tokio::test]
    async fn invalid_destination() {
        let (dir, source, _) = setup();
        let thumbnailer =
            FfmpegThumbnailer::new(PathBuf::from("ffmpeg"), ThumbnailSettings::default());
        let err = thumbnailer
            .generate(&source, VideoId::from(1), &dir.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn missing_source() {
        let (dir, _, thumbs) = setup();
        let thumbnailer =
            FfmpegThumbnailer::new(PathBuf::from("ffmpeg"), ThumbnailSettings::default());
        let err = thumbnailer
            .generate(&dir.path().join("gone.mp4"), VideoId::from(1), &thumbs)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn writes_named_thumbnail() {
        let (dir, source, thumbs) = setup();
        // The output path is the last argument.
        let tool = fake_ffmpeg(dir.path(), r#"for last; do :; done; printf 'jpeg' > "$last""#);
        let thumbnailer = FfmpegThumbnailer::new(tool, ThumbnailSettings::default());

        let name = thumbnailer
            .generate(&source, VideoId::from(7), &thumbs)
            .await
            .unwrap();
        assert_eq!(name, "video_7.jpg");
        assert_eq!(std::fs::read(thumbs.join(&name)).unwrap(), b"jpeg");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn empty_output_is_deleted() {
        let (dir, source, thumbs) = setup();
        let tool = fake_ffmpeg(dir.path(), r#"for last; do :; done; : > "$last""#);
        let thumbnailer = FfmpegThumbnailer::new(tool, ThumbnailSettings::default());

        let err = thumbnailer
            .generate(&source, VideoId::from(7), &thumbs)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolFailed { .. }));
        assert!(!thumbs.join("video_7.jpg").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_leaves_nothing_behind() {
        let (dir, source, thumbs) = setup();
        let tool = fake_ffmpeg(dir.path(), r#"for last; do :; done; : > "$last"; sleep 10"#);
        let thumbnailer = FfmpegThumbnailer::new(
            tool,
            ThumbnailSettings {
                timeout: Duration::from_millis(200),
                ..Default::default()
            },
        );

        let err = thumbnailer
            .generate(&source, VideoId::from(7), &thumbs)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolTimeout { .. }));
        assert!(!thumbs.join("video_7.jpg").exists());
    }
}
