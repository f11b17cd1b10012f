//! Dev server configuration, optionally loaded from a TOML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("expected {0} to be a non-empty string")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DevConfig {
    /// Entry file, relative to the working directory.
    pub entry: PathBuf,
    /// Name of the handler export inside the entry.
    pub handler: String,
    pub http_host: Option<String>,
    pub http_port: u16,
}

/// Same keys as [`DevConfig`], all optional, for layering file and flags.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PartialConfig {
    pub entry: Option<PathBuf>,
    pub handler: Option<String>,
    pub http_host: Option<String>,
    pub http_port: Option<u16>,
}

impl PartialConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Values set in `over` win.
    pub fn merge(self, over: PartialConfig) -> PartialConfig {
        PartialConfig {
            entry: over.entry.or(self.entry),
            handler: over.handler.or(self.handler),
            http_host: over.http_host.or(self.http_host),
            http_port: over.http_port.or(self.http_port),
        }
    }

    pub fn build(self) -> Result<DevConfig, ConfigError> {
        let config = DevConfig {
            entry: self.entry.unwrap_or_default(),
            handler: self.handler.unwrap_or_default(),
            http_host: self.http_host,
            http_port: self.http_port.unwrap_or(DEFAULT_HTTP_PORT),
        };
        config.validate()?;
        Ok(config)
    }
}

impl DevConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry.as_os_str().is_empty() {
            return Err(ConfigError::Missing("entry"));
        }
        if self.handler.trim().is_empty() {
            return Err(ConfigError::Missing("handler"));
        }
        Ok(())
    }

    pub fn host(&self) -> &str {
        self.http_host.as_deref().unwrap_or(DEFAULT_HTTP_HOST)
    }

    /// `<entry stem>.<handler>`, used in the listening banner.
    pub fn label(&self) -> String {
        let stem = self
            .entry
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{stem}.{}", self.handler)
    }
}
