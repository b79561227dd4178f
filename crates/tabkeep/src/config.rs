//! # Configuration and Preferences
//!
//! Two kinds of settings live side by side:
//!
//! - [`TabkeepConfig`]: tunables resolved once at startup by [`confique`], from
//!   environment variables over an optional `tabkeep.toml` in the config
//!   directory over compiled defaults.
//! - [`Preferences`]: user state the application itself changes at runtime
//!   (the autosave toggle, the chosen working directory and its bookmark). It is
//!   stored as `preferences.json` in the data directory and rewritten atomically.
//!
//! ## Available Settings
//!
//! | Key | Env | Default |
//! |-----|-----|---------|
//! | `autosave_interval_ms` | `TABKEEP_AUTOSAVE_INTERVAL_MS` | `2000` |
//! | `fan_out_attempts` | `TABKEEP_FAN_OUT_ATTEMPTS` | `30` |
//! | `fan_out_delay_ms` | `TABKEEP_FAN_OUT_DELAY_MS` | `50` |
//! | `default_font_size` | `TABKEEP_DEFAULT_FONT_SIZE` | `14.0` |
//! | `record_ext` | `TABKEEP_RECORD_EXT` | `json` |

use crate::error::{Result, TabkeepError};
use crate::fsutil::atomic_write;
use confique::Config;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "tabkeep.toml";
pub const PREFERENCES_FILENAME: &str = "preferences.json";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TabkeepConfig {
    /// Period of the autosave timer, in milliseconds.
    #[config(env = "TABKEEP_AUTOSAVE_INTERVAL_MS", default = 2000)]
    pub autosave_interval_ms: u64,

    /// How many times fan-out retries when no window can host a document yet.
    #[config(env = "TABKEEP_FAN_OUT_ATTEMPTS", default = 30)]
    pub fan_out_attempts: u32,

    /// Delay between fan-out retries, in milliseconds.
    #[config(env = "TABKEEP_FAN_OUT_DELAY_MS", default = 50)]
    pub fan_out_delay_ms: u64,

    /// Font size for new documents and for "reset zoom".
    #[config(env = "TABKEEP_DEFAULT_FONT_SIZE", default = 14.0)]
    pub default_font_size: f64,

    /// Extension of record files created in the working directory.
    #[config(env = "TABKEEP_RECORD_EXT", default = "json")]
    pub record_ext: String,
}

impl Default for TabkeepConfig {
    fn default() -> Self {
        Self {
            autosave_interval_ms: 2000,
            fan_out_attempts: 30,
            fan_out_delay_ms: 50,
            default_font_size: crate::model::DEFAULT_FONT_SIZE,
            record_ext: "json".to_string(),
        }
    }
}

impl TabkeepConfig {
    /// Loads the layered configuration. A missing `tabkeep.toml` is not an error.
    pub fn load(config_dir: &Path) -> Result<Self> {
        TabkeepConfig::builder()
            .env()
            .file(config_dir.join(CONFIG_FILENAME))
            .load()
            .map_err(|e| TabkeepError::Config(e.to_string()))
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms)
    }

    pub fn fan_out_delay(&self) -> Duration {
        Duration::from_millis(self.fan_out_delay_ms)
    }

    /// The record extension without a leading dot.
    pub fn record_ext(&self) -> &str {
        self.record_ext.trim_start_matches('.')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default = "default_enable_auto_save")]
    pub enable_auto_save: bool,

    #[serde(default)]
    pub working_directory_path: Option<PathBuf>,

    /// Opaque durable reference to the working directory.
    #[serde(default)]
    pub working_directory_bookmark: Option<String>,
}

fn default_enable_auto_save() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            enable_auto_save: true,
            working_directory_path: None,
            working_directory_bookmark: None,
        }
    }
}

impl Preferences {
    /// Load preferences from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(PREFERENCES_FILENAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(TabkeepError::Io)?;
        let prefs: Preferences = serde_json::from_str(&content)?;
        Ok(prefs)
    }

    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        atomic_write(&dir.as_ref().join(PREFERENCES_FILENAME), content.as_bytes())
    }
}
