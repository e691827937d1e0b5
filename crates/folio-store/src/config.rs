//! TOML configuration.
//!
//! ```toml
//! database = "/var/lib/folio/folio.db"
//! blob_root = "/var/lib/folio/media"
//! public_base_url = "https://example.com/media"
//!
//! [editor]
//! delete_policy = "orphan"      # orphan | cascade | reparent_to_root
//! debounce_quiet_ms = 400
//! debounce_max_ms = 2000
//! ```
//!
//! A missing file means all defaults. `FOLIO_CONFIG` overrides the path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::debounce::DebounceConfig;
use crate::editor::{DeletePolicy, EditorSettings};
use crate::error::ConfigError;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "FOLIO_CONFIG";

const APP_DIR: &str = "folio";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    /// SQLite record store file.
    pub database: PathBuf,
    /// Directory the local blob store writes into.
    pub blob_root: PathBuf,
    /// URL prefix uploaded blobs are served from.
    pub public_base_url: String,
    pub editor: EditorConfig,
}

/// `[editor]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub delete_policy: DeletePolicy,
    pub debounce_quiet_ms: u64,
    pub debounce_max_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        let debounce = DebounceConfig::default();
        Self {
            delete_policy: DeletePolicy::default(),
            debounce_quiet_ms: debounce.quiet_period.as_millis() as u64,
            debounce_max_ms: debounce.max_delay.as_millis() as u64,
        }
    }
}

impl EditorConfig {
    pub fn debounce(&self) -> DebounceConfig {
        DebounceConfig {
            quiet_period: Duration::from_millis(self.debounce_quiet_ms),
            max_delay: Duration::from_millis(self.debounce_max_ms),
        }
    }

    /// Settings for an editing session.
    pub fn settings(&self) -> EditorSettings {
        EditorSettings {
            delete_policy: self.delete_policy,
            debounce: self.debounce(),
        }
    }
}

impl Default for FolioConfig {
    fn default() -> Self {
        let data = default_data_dir();
        Self {
            database: data.join("folio.db"),
            blob_root: data.join("media"),
            public_base_url: "http://localhost:8080/media".to_string(),
            editor: EditorConfig::default(),
        }
    }
}

/// `<data_dir>/folio`, or `./.folio` when the platform has none.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".folio"))
}

/// Where the config file is looked for: `$FOLIO_CONFIG`, else
/// `<config_dir>/folio/folio.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV)
        && !path.is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|p| p.join(APP_DIR).join("folio.toml"))
}

impl FolioConfig {
    /// Parse from TOML text.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load from a file; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::debug!(path = %path.display(), "loaded config");
                Self::from_toml(&text, path)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let path = default_config_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Set database path.
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = path.into();
        self
    }

    /// Set blob root.
    pub fn with_blob_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.blob_root = path.into();
        self
    }
}
