//! Engine configuration
//!
//! Defaults match the behavior operators already rely on: eight character
//! link tokens drawn from `[a-z0-9]`.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Link token issuance settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Characters per token
    pub token_length: usize,
    /// Tokens to try before giving up on a collision streak
    pub max_issue_attempts: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            token_length: 8,
            max_issue_attempts: 5,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Link token settings
    pub link: LinkConfig,
    /// Upper bound on assets in one batch
    pub max_assets_per_batch: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            max_assets_per_batch: 500,
        }
    }
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With token length
    #[inline]
    #[must_use]
    pub fn with_token_length(mut self, length: usize) -> Self {
        self.link.token_length = length;
        self
    }

    /// With token issue attempts
    #[inline]
    #[must_use]
    pub fn with_max_issue_attempts(mut self, attempts: u32) -> Self {
        self.link.max_issue_attempts = attempts;
        self
    }

    /// With asset limit
    #[inline]
    #[must_use]
    pub fn with_max_assets(mut self, max: usize) -> Self {
        self.max_assets_per_batch = max;
        self
    }

    /// Parse from TOML; missing keys take their defaults.
    ///
    /// # Errors
    /// - `ConfigError::Parse` on malformed TOML
    /// - `ConfigError::Invalid` if a value is out of range
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - anything [`EngineConfig::from_toml_str`] returns
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// - `ConfigError::Invalid` naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.link.token_length < 4 {
            return Err(ConfigError::Invalid("link.token_length must be at least 4"));
        }
        if self.link.max_issue_attempts == 0 {
            return Err(ConfigError::Invalid("link.max_issue_attempts must be positive"));
        }
        if self.max_assets_per_batch == 0 {
            return Err(ConfigError::Invalid("max_assets_per_batch must be positive"));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("io error reading {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::new();
        assert_eq!(config.link.token_length, 8);
        assert_eq!(config.link.max_issue_attempts, 5);
        assert_eq!(config.max_assets_per_batch, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            max_assets_per_batch = 40

            [link]
            token_length = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.max_assets_per_batch, 40);
        assert_eq!(config.link.token_length, 12);
        assert_eq!(config.link.max_issue_attempts, 5);
    }

    #[test]
    fn rejects_short_tokens() {
        let err = EngineConfig::from_toml_str("[link]\ntoken_length = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = EngineConfig::from_toml_str("max_assets_per_batch = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn builder() {
        let config = EngineConfig::new().with_token_length(16).with_max_assets(3);
        assert_eq!(config.link.token_length, 16);
        assert_eq!(config.max_assets_per_batch, 3);
    }
}
