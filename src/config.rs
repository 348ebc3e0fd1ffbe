//! # Configuration Module
//!
//! Runtime configuration and data directory setup for Trackflow.
//!
//! ## Data Storage
//!
//! The default cache database lives in the platform-standard data directory:
//! - Linux: `~/.local/share/trackflow/cache.db`
//! - macOS: `~/Library/Application Support/trackflow/cache.db`
//! - Windows: `%APPDATA%\trackflow\cache.db`
//!
//! ## Configuration File
//!
//! An optional JSON file can name the catalog snapshot and the cache:
//!
//! ```json
//! { "catalog_path": "catalog.json", "cache_path": "cache.db", "use_cache": true }
//! ```
//!
//! Relative paths are resolved against the current directory. Command-line
//! flags win over file values.

use anyhow::{Context, Result};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the Trackflow data directory, creating it if needed.
///
/// # Errors
///
/// Fails when the platform has no data directory or the `trackflow`
/// subdirectory cannot be created.
///
/// # Examples
///
/// ```no_run
/// use trackflow::config::get_data_dir;
///
/// let dir = get_data_dir()?;
/// println!("Data location: {}", dir.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let app_dir = data_dir.join("trackflow");
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create Trackflow data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir)
}

/// Returns the default cache database path inside [`get_data_dir`].
pub fn get_cache_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("cache.db"))
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Catalog snapshot used as the remote catalog.
    pub catalog_path: Option<PathBuf>,
    /// Cache database. `None` means the default location.
    pub cache_path: Option<PathBuf>,
    /// Read through and write through the cache.
    pub use_cache: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            cache_path: None,
            use_cache: true,
        }
    }
}

impl RuntimeConfig {
    /// Load a configuration file. Relative paths in it are made absolute.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.absolutized()
    }

    #[must_use]
    pub fn with_catalog_path(mut self, path: PathBuf) -> Self {
        self.catalog_path = Some(path);
        self
    }

    #[must_use]
    pub fn with_cache_path(mut self, path: PathBuf) -> Self {
        self.cache_path = Some(path);
        self
    }

    #[must_use]
    pub const fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Cache database to open, or `None` when caching is off.
    pub fn resolved_cache_path(&self) -> Result<Option<PathBuf>> {
        if !self.use_cache {
            return Ok(None);
        }
        match &self.cache_path {
            Some(path) => Ok(Some(absolute(path)?)),
            None => get_cache_path().map(Some),
        }
    }

    fn absolutized(self) -> Result<Self> {
        Ok(Self {
            catalog_path: self.catalog_path.as_deref().map(absolute).transpose()?,
            cache_path: self.cache_path.as_deref().map(absolute).transpose()?,
            use_cache: self.use_cache,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .with_context(|| format!("Failed to resolve path {}", path.display()))?
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_cache_path_structure() {
        let path = get_cache_path().expect("Should get valid path");
        assert!(path.is_absolute(), "Cache path should be absolute");
        assert_eq!(path.file_name().unwrap(), "cache.db");

        let parent = path.parent().expect("Should have parent directory");
        assert_eq!(parent.file_name().unwrap(), "trackflow");
        assert!(parent.is_dir());
    }

    #[test]
    fn test_default_uses_cache() {
        let config = RuntimeConfig::default();
        assert!(config.use_cache);
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_disabled_cache_resolves_to_none() {
        let config = RuntimeConfig::default()
            .with_cache_path(PathBuf::from("cache.db"))
            .without_cache();
        assert_eq!(config.resolved_cache_path().unwrap(), None);
    }

    #[test]
    fn test_load_absolutizes_relative_paths() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("trackflow.json");
        fs::write(&file, r#"{"catalog_path": "snap.json", "use_cache": false}"#).unwrap();

        let config = RuntimeConfig::load(&file).unwrap();
        assert!(!config.use_cache);
        let catalog = config.catalog_path.unwrap();
        assert!(catalog.is_absolute());
        assert!(catalog.ends_with("snap.json"));
        assert!(config.cache_path.is_none());
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("broken.json");
        fs::write(&file, "{ not json").unwrap();
        let err = RuntimeConfig::load(&file).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }
}
