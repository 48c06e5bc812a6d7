use crate::constants::SEARCH_COMPONENT_TIMEOUT;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "chrome-screenshot.config.json";

/// Addon configuration file format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonConfig {
    /// Milliseconds a story gets to emit its first wrapper INIT
    #[serde(default = "default_search_timeout_ms")]
    pub search_component_timeout_ms: u64,

    /// Where sinks write their output
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_search_timeout_ms() -> u64 {
    SEARCH_COMPONENT_TIMEOUT.as_millis() as u64
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./screenshots")
}

impl AddonConfig {
    /// Load config from a directory, falling back to defaults
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: AddonConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(AddonConfig::default())
        }
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_component_timeout_ms)
    }
}

impl Default for AddonConfig {
    fn default() -> Self {
        Self {
            search_component_timeout_ms: default_search_timeout_ms(),
            output_dir: default_output_dir(),
        }
    }
}
