//! Gateway settings: `<data dir>/borgd.json`, overridden by command-line flags.

use std::path::{Path, PathBuf};

use borg::config::BrainConfig;
use borg::error::BrainError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 2001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Brain file to serve; defaults to the current brain in the data directory.
    pub brain: Option<PathBuf>,
    pub brain_settings: BrainConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            brain: None,
            brain_settings: BrainConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, BrainError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
