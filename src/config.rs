//! Configuration file parser for ~/.config/moviematch/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::catalog::{DEFAULT_BASE_URL, DEFAULT_SUGGESTION_LIMIT};
use crate::recommend::DEFAULT_CONCURRENCY;

/// Environment variable that overrides `tmdb_api_key`.
pub const API_KEY_ENV: &str = "TMDB_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Insecure api_base_url '{0}': HTTPS required (except localhost for testing)")]
    InsecureBaseUrl(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Debug output masks `tmdb_api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TMDB v3 API key (alternative to the TMDB_API_KEY env var).
    /// Env var takes precedence over config file.
    pub tmdb_api_key: Option<String>,

    /// Catalog API root, e.g. `https://api.themoviedb.org/3`.
    pub api_base_url: String,

    /// Prefix for poster paths.
    pub image_base_url: String,

    /// Response language sent with every request.
    pub language: String,

    /// Maximum number of type-ahead suggestions.
    pub suggestion_limit: usize,

    /// Favorites fetched concurrently while building recommendations.
    pub recommendation_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            image_base_url: "https://image.tmdb.org/t/p/w500".to_string(),
            language: "en-US".to_string(),
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
            recommendation_concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "tmdb_api_key",
                &self.tmdb_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_base_url", &self.api_base_url)
            .field("image_base_url", &self.image_base_url)
            .field("language", &self.language)
            .field("suggestion_limit", &self.suggestion_limit)
            .field("recommendation_concurrency", &self.recommendation_concurrency)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "tmdb_api_key",
        "api_base_url",
        "image_base_url",
        "language",
        "suggestion_limit",
        "recommendation_concurrency",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Plain-HTTP base URL to a remote host → `Err(ConfigError::InsecureBaseUrl)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            api_base_url = %config.api_base_url,
            language = %config.language,
            "Loaded configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base_url.as_str();
        if !base.starts_with("https://") {
            let is_localhost =
                base.starts_with("http://127.0.0.1") || base.starts_with("http://localhost");
            if !is_localhost {
                return Err(ConfigError::InsecureBaseUrl(base.to_string()));
            }
        }
        Ok(())
    }

    /// The API key from the environment, falling back to the config file.
    pub fn api_key(&self) -> Option<SecretString> {
        self.api_key_with_env(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_with_env(&self, env_value: Option<String>) -> Option<SecretString> {
        env_value
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.tmdb_api_key.clone())
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from)
    }
}

// ============================================================================
// Tests
// ============================================================================
