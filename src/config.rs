//! Configuration types for the roost CLI.
//!
//! This module provides configuration structs for loading and validating
//! serving settings from TOML files:
//!
//! - [`Config`] - Root configuration struct
//! - [`ServerConfig`] - Port, worker count, and transport settings
//!
//! All configuration types support serde deserialization and provide
//! sensible defaults suitable for development use.
//!
//! # Example
//!
//! ```
//! use roost::config::Config;
//!
//! let toml = r#"
//! [server]
//! port = 8443
//! workers = 4
//! "#;
//!
//! let config: Config = toml::from_str(toml).unwrap();
//! assert!(config.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::constants;
use crate::topology::BindFailurePolicy;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// roost.toml configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
}

/// Serving topology settings.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub quiet: bool,
    #[serde(default)]
    pub on_bind_failure: BindFailurePolicy,
    #[serde(default)]
    pub tls: Option<TlsFiles>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            workers: default_workers(),
            quiet: false,
            on_bind_failure: BindFailurePolicy::default(),
            tls: None,
        }
    }
}

/// Paths to PEM files selecting encrypted transport.
#[derive(Debug, Deserialize)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
    #[serde(default)]
    pub ca: Option<PathBuf>,
}

const fn default_port() -> u16 {
    constants::DEFAULT_PORT
}

const fn default_workers() -> usize {
    constants::DEFAULT_WORKERS
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Validate the configuration.
    ///
    /// Hard errors (a worker count of 0) fail; questionable-but-workable
    /// settings come back as warnings for the caller to log.
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        if self.server.workers == 0 {
            anyhow::bail!("worker count must be at least 1");
        }

        let threads = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        if self.server.workers > threads * 2 {
            result.warnings.push(format!(
                "{} workers on {} hardware threads; extra workers only add memory overhead",
                self.server.workers, threads
            ));
        }

        if self.server.port != 0 && self.server.port < 1024 {
            result.warnings.push(format!(
                "port {} is privileged and usually needs elevated permissions",
                self.server.port
            ));
        }

        if let Some(tls) = &self.server.tls {
            for (name, path) in [("cert", Some(&tls.cert)), ("key", Some(&tls.key)), ("ca", tls.ca.as_ref())] {
                if let Some(path) = path {
                    if !path.exists() {
                        result
                            .warnings
                            .push(format!("tls {name} file does not exist: {}", path.display()));
                    }
                }
            }
        }

        Ok(result)
    }
}
