//! Derived filesystem locations, computed once at startup.

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::LibraryConfig;

/// Absolute locations of everything nepenthe writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub data_dir: PathBuf,
    pub database: PathBuf,
    pub thumbnails: PathBuf,
}

impl DataPaths {
    /// Resolve paths from the library config and create the directories.
    pub fn resolve(library: &LibraryConfig) -> Result<Self> {
        let data_dir = std::path::absolute(&library.data_dir)
            .with_context(|| format!("Invalid data directory: {:?}", library.data_dir))?;
        let paths = Self {
            database: data_dir.join(&library.database_file),
            thumbnails: data_dir.join(&library.thumbnails_dir_name),
            data_dir,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    /// Create the data and thumbnail directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.thumbnails] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        }
        Ok(())
    }

    pub fn thumbnail(&self, file_name: &str) -> PathBuf {
        self.thumbnails.join(file_name)
    }

    pub fn database_str(&self) -> std::borrow::Cow<'_, str> {
        self.database.to_string_lossy()
    }
}
