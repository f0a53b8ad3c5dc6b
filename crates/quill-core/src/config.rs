//! Configuration management for Quill.
//!
//! Loads configuration from ${QUILL_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod paths {
    //! Path resolution for Quill configuration and data files.
    //!
    //! QUILL_HOME resolution order:
    //! 1. QUILL_HOME environment variable (if set)
    //! 2. ~/.config/quill (default)

    use std::path::PathBuf;

    /// Returns the Quill home directory.
    ///
    /// Checks QUILL_HOME env var first, falls back to ~/.config/quill
    pub fn quill_home() -> PathBuf {
        if let Ok(home) = std::env::var("QUILL_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("quill"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        quill_home().join("config.toml")
    }

    /// Returns the path to the persisted token file.
    pub fn tokens_path() -> PathBuf {
        quill_home().join("tokens.json")
    }
}

/// Config file contents written by `quill config init`.
const DEFAULT_CONFIG_TEMPLATE: &str = "\
# Quill configuration
#
# Base URL of the article service (scheme + host + port). The /api prefix
# is added per request. Overridden by QUILL_API_URL when set.
# api_url = \"http://localhost:8000\"
";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the article service
    pub api_url: Option<String>,
}

impl Config {
    /// Base URL used when neither the env var nor the config file sets one.
    pub const DEFAULT_API_URL: &'static str = "http://localhost:8000";

    /// Loads configuration from the default path.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Resolves the base URL of the article service.
    ///
    /// Resolution order:
    /// 1. `override_url` (CLI flag), if Some and non-empty
    /// 2. QUILL_API_URL env var (if set and non-empty)
    /// 3. `api_url` from config.toml
    /// 4. Default: `http://localhost:8000`
    ///
    /// Trailing slashes are dropped so the /api prefix joins cleanly.
    ///
    /// # Errors
    /// Returns an error if the selected URL is not well-formed.
    pub fn effective_api_url(&self, override_url: Option<&str>) -> Result<String> {
        let env_url = std::env::var("QUILL_API_URL").ok();
        Self::resolve_api_url(override_url, env_url.as_deref(), self.api_url.as_deref())
    }

    /// Resolution logic, separated from the env read for testability.
    fn resolve_api_url(
        override_url: Option<&str>,
        env_url: Option<&str>,
        config_url: Option<&str>,
    ) -> Result<String> {
        for candidate in [override_url, env_url, config_url] {
            let Some(candidate) = candidate else {
                continue;
            };
            let trimmed = candidate.trim();
            if trimmed.is_empty() {
                continue;
            }
            Self::validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }

        Ok(Self::DEFAULT_API_URL.to_string())
    }

    /// Validates that a URL is well-formed.
    fn validate_url(url: &str) -> Result<()> {
        url::Url::parse(url).with_context(|| format!("Invalid API base URL: {url}"))?;
        Ok(())
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, DEFAULT_CONFIG_TEMPLATE)
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}
