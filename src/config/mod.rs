mod paths;
mod types;

pub use paths::DataPaths;
pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./nepenthe.toml",
        "./config.toml",
        "~/.config/nepenthe/config.toml",
        "/etc/nepenthe/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Apply `NEPENTHE_*` environment overrides.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(host) = lookup("NEPENTHE_HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("NEPENTHE_PORT") {
        config.server.port = port
            .trim()
            .parse()
            .with_context(|| format!("Invalid NEPENTHE_PORT: {port:?}"))?;
    }
    if let Some(paths) = lookup("NEPENTHE_VIDEO_PATHS") {
        config.library.video_paths = split_paths(&paths);
    }
    Ok(())
}

/// Split a comma separated path list, dropping empty entries.
pub fn split_paths(list: &str) -> Vec<PathBuf> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| PathBuf::from(shellexpand::tilde(s).as_ref()))
        .collect()
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.tools.thumbnail_width == 0 {
        anyhow::bail!("Thumbnail width cannot be 0");
    }

    if config.tools.probe_timeout_secs == 0 || config.tools.thumbnail_timeout_secs == 0 {
        anyhow::bail!("Tool timeouts must be at least 1 second");
    }

    if config.ingest.workers == 0 {
        anyhow::bail!("Ingest workers must be at least 1");
    }

    for path in &config.library.video_paths {
        if !path.exists() {
            tracing::warn!("Video path does not exist: {:?}", path);
        }
    }

    Ok(())
}
