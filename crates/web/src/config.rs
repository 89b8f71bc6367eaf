//! Server configuration

use reelcheck_common::{Error, Result};
use reelcheck_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Browser origins allowed through CORS; "*" allows any
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Engine tunables
    #[serde(default)]
    pub engine: EngineConfig,

    /// Inference adapter commands
    #[serde(default)]
    pub adapters: AdapterConfig,
}

/// External inference commands, given as argv prefixes. The frame path
/// is appended as the final argument on each invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default)]
    pub detect_command: Vec<String>,

    #[serde(default)]
    pub ocr_command: Vec<String>,
}

fn default_listen() -> String {
    "127.0.0.1:7000".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            allowed_origins: default_allowed_origins(),
            engine: EngineConfig::default(),
            adapters: AdapterConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    /// Load from `path`, falling back to defaults when the file does
    /// not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
