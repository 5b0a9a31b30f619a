//! Dev server configuration.
//!
//! Defaults, overridden by an optional `elbebe.toml` in the project root,
//! overridden by command-line flags.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::sandbox::SandboxConfig;

pub const CONFIG_FILE: &str = "elbebe.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DevConfig {
    pub host: String,
    pub port: u16,
    pub render: SandboxConfig,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            render: SandboxConfig::default(),
        }
    }
}

impl DevConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load `path`. A missing file is not an error when `required` is false.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }
}
