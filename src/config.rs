//! Application configuration.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file: `--config PATH`, or `config.toml` in the platform config
//!    directory if it exists
//! 3. `SIMILAR_IMAGES_*` environment variables (e.g. `SIMILAR_IMAGES_WORKERS=8`)
//! 4. Command-line flags, applied by the caller
//!
//! # Example file
//!
//! ```toml
//! workers = 8
//! cache_max_entries = 250000
//! extensions = ["jpg", "png", "heic"]
//! ignore_patterns = ["thumbnails/"]
//! min_similarity = 85
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::trawler::{ExtensionFilter, TrawlerConfig, WalkerConfig, IMAGE_EXTENSIONS};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SIMILAR_IMAGES_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hashing worker threads; `0` uses all available cores.
    pub workers: usize,
    /// Cache store location; defaults to the platform cache directory.
    pub cache_path: Option<PathBuf>,
    /// Maximum number of cached fingerprints.
    pub cache_max_entries: usize,
    /// File extensions treated as images.
    pub extensions: Vec<String>,
    pub follow_symlinks: bool,
    pub skip_hidden: bool,
    /// Gitignore-style patterns to skip.
    pub ignore_patterns: Vec<String>,
    /// Flush the cache after this many new fingerprints; `0` only flushes at the end.
    pub flush_every: usize,
    /// Default `find` threshold, `0..=100`.
    pub min_similarity: u8,
    /// Match rotated and mirrored copies.
    pub consider_symmetry: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 0,
            cache_path: None,
            cache_max_entries: 100_000,
            extensions: IMAGE_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            follow_symlinks: false,
            skip_hidden: true,
            ignore_patterns: Vec::new(),
            flush_every: 500,
            min_similarity: 90,
            consider_symmetry: true,
        }
    }
}

impl Config {
    /// The layered figment without CLI overrides.
    ///
    /// An explicit `config_file` is always merged; the default file only if
    /// it exists.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match config_file {
            Some(path) => figment = figment.merge(Toml::file_exact(path)),
            None => {
                if let Some(path) = Self::config_path().filter(|p| p.exists()) {
                    log::debug!("Using config file {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate the configuration.
    ///
    /// # Errors
    ///
    /// Fails if an explicit config file is missing, any layer is malformed,
    /// or a value is out of range.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_file {
            if !path.is_file() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }
        let config: Config = Self::figment(config_file)
            .extract()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.min_similarity > 100 {
            anyhow::bail!(
                "min_similarity must be between 0 and 100, got {}",
                self.min_similarity
            );
        }
        if self.cache_max_entries == 0 {
            anyhow::bail!("cache_max_entries must be at least 1");
        }
        if self.extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            anyhow::bail!("extensions must name at least one file type");
        }
        Ok(())
    }

    /// Write the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Fails if the file or its directory cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "similar-images", "similar-images")
    }

    /// Default platform-specific configuration file.
    pub fn config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Default platform-specific cache store.
    pub fn default_cache_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.cache_dir().join("fingerprints.json"))
    }

    /// The configured cache path, falling back to the platform default.
    pub fn resolved_cache_path(&self) -> Option<PathBuf> {
        self.cache_path.clone().or_else(Self::default_cache_path)
    }

    /// Trawler settings derived from this configuration.
    pub fn trawler_config(&self) -> TrawlerConfig {
        TrawlerConfig::default()
            .with_workers(self.workers)
            .with_flush_every(Some(self.flush_every))
            .with_predicate(ExtensionFilter::new(&self.extensions))
            .with_walker_config(WalkerConfig {
                follow_symlinks: self.follow_symlinks,
                skip_hidden: self.skip_hidden,
                ignore_patterns: self.ignore_patterns.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_similarity, 90);
        assert!(config.consider_symmetry);
        assert!(config.extensions.contains(&"png".to_string()));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = Config {
            min_similarity: 101,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            extensions: vec![".".to_string()],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trawler_config_mapping() {
        let config = Config {
            workers: 3,
            flush_every: 0,
            extensions: vec!["PNG".to_string()],
            skip_hidden: false,
            ..Config::default()
        };
        let trawler = config.trawler_config();
        assert_eq!(trawler.workers, 3);
        assert_eq!(trawler.flush_every, None);
        assert!(!trawler.walker.skip_hidden);
        assert!(trawler.predicate.accepts(Path::new("x.png")));
        assert!(!trawler.predicate.accepts(Path::new("x.jpg")));
    }

    #[test]
    fn test_save_then_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            workers: 6,
            cache_path: Some(dir.path().join("c.json")),
            ignore_patterns: vec!["raw/".to_string()],
            ..Config::default()
        };
        config.save(&path).unwrap();

        let loaded: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file_exact(&path))
            .extract()
            .unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
