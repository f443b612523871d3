//! External tool discovery.
//!
//! [`ToolPaths`] is resolved once at startup and injected into the prober and
//! thumbnailer, so nothing mutates tool locations at runtime.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Resolved executable locations for the tools nepenthe shells out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self::resolve(None, None)
    }
}

impl ToolPaths {
    /// Resolve tool paths from optional overrides.
    ///
    /// An override that exists is used as-is. Otherwise the tool is looked up
    /// in `PATH` with [`which::which`]. A tool that cannot be found keeps its
    /// bare name, so invoking it later fails with `ToolNotFound` instead of
    /// failing startup.
    pub fn resolve(ffprobe: Option<&Path>, ffmpeg: Option<&Path>) -> Self {
        Self {
            ffprobe: resolve_tool("ffprobe", ffprobe),
            ffmpeg: resolve_tool("ffmpeg", ffmpeg),
        }
    }
}

fn resolve_tool(name: &str, custom: Option<&Path>) -> PathBuf {
    match custom {
        Some(p) if p.exists() => p.to_path_buf(),
        Some(p) => {
            tracing::warn!(tool = name, path = %p.display(), "Configured tool path does not exist, searching PATH");
            which::which(name).unwrap_or_else(|_| PathBuf::from(name))
        }
        None => which::which(name).unwrap_or_else(|_| PathBuf::from(name)),
    }
}

/// Availability information for a tool, returned by [`check_tools`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool could be executed.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Path that was checked.
    pub path: PathBuf,
}

/// Check ffprobe and ffmpeg by running `-version` on each.
pub fn check_tools(paths: &ToolPaths) -> Vec<ToolInfo> {
    [("ffprobe", &paths.ffprobe), ("ffmpeg", &paths.ffmpeg)]
        .into_iter()
        .map(|(name, path)| {
            let version = detect_version(path);
            ToolInfo {
                name: name.to_string(),
                available: version.is_some(),
                version,
                path: path.clone(),
            }
        })
        .collect()
}

fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("my-ffprobe");
        std::fs::write(&fake, b"").unwrap();

        let paths = ToolPaths::resolve(Some(&fake), None);
        assert_eq!(paths.ffprobe, fake);
    }

    #[test]
    fn missing_override_falls_back() {
        let paths = ToolPaths::resolve(Some(Path::new("/definitely/not/here/ffprobe")), None);
        assert_ne!(paths.ffprobe, PathBuf::from("/definitely/not/here/ffprobe"));
        assert!(paths.ffprobe.ends_with("ffprobe"));
    }

    #[test]
    fn check_tools_reports_both() {
        let paths = ToolPaths {
            ffprobe: PathBuf::from("nonexistent_ffprobe_xyz"),
            ffmpeg: PathBuf::from("nonexistent_ffmpeg_xyz"),
        };
        let infos = check_tools(&paths);
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["ffprobe", "ffmpeg"]);
        assert!(infos.iter().all(|i| !i.available && i.version.is_none()));
    }
}
