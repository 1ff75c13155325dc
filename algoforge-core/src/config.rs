//! `algoforge.toml` configuration.
//!
//! ```toml
//! [output]
//! pretty = true
//!
//! [logging]
//! filter = "algoforge=debug"
//!
//! [registry]
//! path = "indicators.toml"
//! ```
//!
//! Every section is optional. A relative registry path resolves against the
//! directory of the config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::{IndicatorRegistry, RegistryError};

pub const DEFAULT_CONFIG_FILE: &str = "algoforge.toml";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlgoforgeConfig {
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Pretty-print emitted documents. Canonical strings are always compact.
    pub pretty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Custom indicator definitions merged over the builtins.
    pub path: Option<PathBuf>,
}

impl AlgoforgeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let mut config = Self::from_toml_str(&content)?;
        if let (Some(registry), Some(base)) = (config.registry.path.as_mut(), path.parent()) {
            if registry.is_relative() {
                *registry = base.join(&*registry);
            }
        }
        Ok(config)
    }

    /// The builtin registry with any configured custom definitions merged in.
    pub fn registry(&self) -> Result<IndicatorRegistry, ConfigError> {
        let mut registry = IndicatorRegistry::builtin();
        if let Some(path) = &self.registry.path {
            registry.merge(IndicatorRegistry::from_toml_file(path)?);
        }
        Ok(registry)
    }
}
