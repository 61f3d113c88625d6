//! Settings persisted as JSON in the user config directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::typewriter::TypewriterConfig;

/// Errors loading or saving settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Could not determine a config directory")]
    NoConfigDir,
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// API base, e.g. `http://localhost:7860/api/v1`.
    pub base_url: String,
    /// Optional model selector forwarded with every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Connect timeout in seconds. Streams themselves are unbounded.
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7860/api/v1".to_string(),
            model: None,
            request_timeout_secs: 30,
        }
    }
}

/// Chat pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Tools whose successful completion means the flow structure changed
    /// and subscribers should resync graph state.
    pub mutation_tools: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            mutation_tools: vec![
                "lf_workflow_patch".to_string(),
                "lf_add_custom_component".to_string(),
            ],
        }
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub client: ClientSettings,
    pub typewriter: TypewriterConfig,
    pub chat: ChatConfig,
}

impl Settings {
    /// Default config file location (`<config dir>/flowchat/config.json`).
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(dir.join("flowchat").join("config.json"))
    }

    /// Load settings from a path. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load from the default location.
    pub fn load_default() -> Result<Self, SettingsError> {
        Self::load(&Self::default_path()?)
    }

    /// Save settings to a path, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
