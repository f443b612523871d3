//! FFprobe-based metadata probing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{MetadataProbe, VideoMetadata};
use crate::{Error, Result, ToolCommand};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<Value>,
}

// Fields are kept as raw JSON values so one odd field cannot fail the parse.
#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<Value>,
    #[serde(default)]
    height: Option<Value>,
}

/// Metadata prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(ffprobe: PathBuf, timeout: Duration) -> Self {
        Self { ffprobe, timeout }
    }
}

#[async_trait]
impl MetadataProbe for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<VideoMetadata> {
        if !path.is_file() {
            return Err(Error::file_not_found(path));
        }

        let output = ToolCommand::new(self.ffprobe.clone())
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path.to_string_lossy())
            .timeout(self.timeout)
            .execute()
            .await?;

        parse_ffprobe_json(&output.stdout)
    }
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
///
/// Duration comes from the container report and is truncated to whole
/// seconds. Width and height come from the first stream whose `codec_type` is
/// `video`. Anything missing or unparseable is left as `None`.
pub fn parse_ffprobe_json(json: &str) -> Result<VideoMetadata> {
    let output: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| Error::parse_error("ffprobe", e.to_string()))?;

    let duration = output
        .format
        .and_then(|f| f.duration)
        .as_ref()
        .and_then(number_from_value)
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(|d| d.trunc() as i64);

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    let dimension = |v: Option<&Value>| {
        v.and_then(number_from_value)
            .filter(|n| n.is_finite() && *n > 0.0 && *n <= u32::MAX as f64)
            .map(|n| n as u32)
    };

    Ok(VideoMetadata {
        duration,
        width: video.and_then(|s| dimension(s.width.as_ref())),
        height: video.and_then(|s| dimension(s.height.as_ref())),
    })
}

/// ffprobe reports some numbers as JSON strings (`"duration": "12.48"`).
fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "audio", "codec_name": "aac", "channels": 2},
            {"index": 1, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
            {"index": 2, "codec_type": "video", "codec_name": "mjpeg", "width": 320, "height": 240}
        ],
        "format": {"filename": "a.mp4", "format_name": "mov,mp4", "duration": "125.960000"}
    }"#;

    #[test]
    fn parses_first_video_stream_and_truncates_duration() {
        let meta = parse_ffprobe_json(SAMPLE).unwrap();
        assert_eq!(
            meta,
            VideoMetadata {
                duration: Some(125),
                width: Some(1920),
                height: Some(1080),
            }
        );
    }

    #[test]
    fn missing_fields_are_absent() {
        let meta = parse_ffprobe_json(r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#)
            .unwrap();
        assert!(meta.is_empty());

        let meta = parse_ffprobe_json("{}").unwrap();
        assert!(meta.is_empty());
    }

    #[test]
    fn malformed_fields_do_not_fail_the_parse() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": "wide", "height": 720}],
            "format": {"duration": "N/A"}
        }"#;
        let meta = parse_ffprobe_json(json).unwrap();
        assert_eq!(meta.duration, None);
        assert_eq!(meta.width, None);
        assert_eq!(meta.height, Some(720));
    }

    #[test]
    fn numeric_duration_is_accepted() {
        let meta = parse_ffprobe_json(r#"{"format": {"duration": 9.99}}"#).unwrap();
        assert_eq!(meta.duration, Some(9));
    }

    #[test]
    fn unparseable_output_is_an_error() {
        let err = parse_ffprobe_json("not json").unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
        assert!(parse_ffprobe_json("").is_err());
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let prober = FfprobeProber::new(PathBuf::from("ffprobe"), Duration::from_secs(5));
        let err = prober
            .probe(Path::new("/no/such/file.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn missing_tool_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("a.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        let prober = FfprobeProber::new(
            PathBuf::from("nonexistent_ffprobe_xyz"),
            Duration::from_secs(5),
        );
        let err = prober.probe(&video).await.unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }
}
