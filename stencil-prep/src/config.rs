//! Configuration management for stencil-prep

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::formats::{DocumentFormat, FormatRegistry};

/// Default opening delimiter of markup expression blocks
pub const DEFAULT_OPEN_DELIMITER: &str = "{%";

/// Default closing delimiter of markup expression blocks
pub const DEFAULT_CLOSE_DELIMITER: &str = "%}";

/// File name looked up inside the user configuration directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Preparation configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Format detection configuration
    pub formats: FormatsConfig,
    /// Markup backend configuration
    pub markup: MarkupConfig,
}

/// Format detection configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FormatsConfig {
    /// Extra extensions mapped to a format (e.g. `docm = "docx"`)
    pub aliases: BTreeMap<String, DocumentFormat>,
}

impl FormatsConfig {
    /// Build the extension table: defaults plus configured aliases
    pub fn registry(&self) -> FormatRegistry {
        FormatRegistry::new().with_aliases(self.aliases.iter().map(|(ext, f)| (ext, *f)))
    }
}

/// Markup backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    /// Opening delimiter of expression blocks
    pub open: String,
    /// Closing delimiter of expression blocks
    pub close: String,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            open: DEFAULT_OPEN_DELIMITER.to_string(),
            close: DEFAULT_CLOSE_DELIMITER.to_string(),
        }
    }
}

impl MarkupConfig {
    /// Delimiters to use, falling back to the defaults for empty values
    pub fn delimiters(&self) -> (&str, &str) {
        if self.open.is_empty() || self.close.is_empty() {
            tracing::warn!("empty markup delimiter configured, using defaults");
            (DEFAULT_OPEN_DELIMITER, DEFAULT_CLOSE_DELIMITER)
        } else {
            (&self.open, &self.close)
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the user configuration file if it exists, defaults otherwise
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Location of the user configuration file (~/.config/stencil-prep/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stencil-prep").join(CONFIG_FILE_NAME))
    }
}
