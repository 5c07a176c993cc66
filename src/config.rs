//! Application configuration: a TOML file with `[api]` and `[search]`
//! tables, plus environment overrides for the credentials.
//!
//! ```toml
//! [api]
//! api_key = "..."
//! timeout_seconds = 10
//!
//! [search]
//! rare_view_threshold = 5
//! status_delay_ms = 0
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use rare_search::backends::youtube::DEFAULT_BASE_URL;
use rare_search::{SearchConfig, YouTubeConfig};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Environment variable holding the API key. Takes precedence over the file.
pub const API_KEY_ENV: &str = "RAREFIND_API_KEY";

/// Fallback environment variable for the API key.
pub const YOUTUBE_API_KEY_ENV: &str = "YOUTUBE_API_KEY";

/// Environment variable overriding the API root.
pub const API_BASE_URL_ENV: &str = "RAREFIND_API_BASE_URL";

const APP_DIR: &str = "rarefind";
const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Upstream API credentials and transport settings.
    pub api: ApiConfig,
    /// Search tuning.
    pub search: SearchConfig,
}

/// Upstream API settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// YouTube Data API key.
    pub api_key: Option<String>,
    /// API root.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Custom User-Agent header.
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 10,
            user_agent: None,
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AppError::Config(format!("{}: {e}", path.display())))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file location, `$XDG_CONFIG_HOME/rarefind/config.toml`.
    pub fn default_config_path() -> PathBuf {
        Self::config_path_from(|name| std::env::var_os(name))
    }

    /// Resolve the config file location through `lookup`.
    ///
    /// A relative `XDG_CONFIG_HOME` is ignored. Falls back to `$HOME/.config`,
    /// then to the system temp directory.
    fn config_path_from(lookup: impl Fn(&str) -> Option<OsString>) -> PathBuf {
        lookup("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .filter(|dir| dir.is_absolute())
            .or_else(|| lookup("HOME").map(|home| PathBuf::from(home).join(".config")))
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR)
            .join(CONFIG_FILE)
    }

    /// Load the configuration the CLI runs with.
    ///
    /// An explicit `path` must exist. Without one, the default path is used
    /// when present and built-in defaults otherwise. Environment overrides
    /// are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_config_path();
                if default_path.is_file() {
                    tracing::debug!(path = %default_path.display(), "loading config");
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(config.with_overrides(|name| std::env::var(name).ok()))
    }

    /// Apply environment-style overrides read through `lookup`.
    ///
    /// `RAREFIND_API_KEY` wins over `YOUTUBE_API_KEY`, which wins over the
    /// file. Blank values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_blank(API_KEY_ENV).or_else(|| non_blank(YOUTUBE_API_KEY_ENV)) {
            self.api.api_key = Some(key);
        }
        if let Some(url) = non_blank(API_BASE_URL_ENV) {
            self.api.base_url = url;
        }
        self
    }

    /// Build the upstream client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if no API key is configured.
    pub fn youtube_config(&self) -> Result<YouTubeConfig> {
        let key = self
            .api
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config(format!(
                    "no API key configured; set {API_KEY_ENV} or [api].api_key in {}",
                    Self::default_config_path().display()
                ))
            })?;

        let mut config = YouTubeConfig::new(key)
            .with_base_url(self.api.base_url.clone())
            .with_timeout(self.api.timeout_seconds);
        config.user_agent = self.api.user_agent.clone();
        Ok(config)
    }

    /// Validate search settings and API settings.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.youtube_config()?.validate()?;
        Ok(())
    }
}
