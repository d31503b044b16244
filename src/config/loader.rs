//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{LogFormat, ProxyConfig};
use crate::config::validation::{validate_config, ValidationErrors};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    build_config(Some(content), &Overrides::default())
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind_address: Option<String>,
    pub backend_url: Option<String>,
    pub strip_volatile_keys: Option<bool>,
    pub strip_timestamp_prefixes: Option<bool>,
    pub log_format: Option<LogFormat>,
}

impl Overrides {
    pub fn apply(&self, config: &mut ProxyConfig) {
        if let Some(addr) = &self.bind_address {
            config.listener.bind_address = addr.clone();
        }
        if let Some(url) = &self.backend_url {
            config.backend.base_url = url.clone();
        }
        if let Some(enabled) = self.strip_volatile_keys {
            config.normalization.strip_volatile_keys = enabled;
        }
        if let Some(enabled) = self.strip_timestamp_prefixes {
            config.normalization.strip_timestamp_prefixes = enabled;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
    }
}

/// Build the effective configuration: defaults, then the file (if any), then
/// command-line overrides. Validated once, at the end.
pub fn resolve_config(path: Option<&Path>, overrides: &Overrides) -> Result<ProxyConfig, ConfigError> {
    let content = path.map(fs::read_to_string).transpose()?;
    build_config(content.as_deref(), overrides)
}

fn build_config(content: Option<&str>, overrides: &Overrides) -> Result<ProxyConfig, ConfigError> {
    let mut config = match content {
        Some(content) => toml::from_str(content)?,
        None => ProxyConfig::default(),
    };
    overrides.apply(&mut config);
    validate_config(&config)?;
    Ok(config)
}
