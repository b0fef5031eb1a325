//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default TCP port of the Blender add-on command socket.
pub const DEFAULT_BLENDER_PORT: u16 = 9876;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Blender add-on connection settings.
    #[serde(default)]
    pub blender: BlenderConfig,

    /// Generation job retention settings.
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blender.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "blender.port must be between 1 and 65535".to_string(),
            });
        }
        if self.blender.host.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "blender.host cannot be empty".to_string(),
            });
        }
        if self.blender.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "blender.timeout_secs must be greater than zero".to_string(),
            });
        }
        if self.jobs.max_tracked == 0 {
            return Err(ConfigError::ValidationError {
                message: "jobs.max_tracked must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Blender add-on socket configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlenderConfig {
    /// Host the add-on listens on.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the add-on listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds to wait for a single command/response exchange.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BlenderConfig {
    /// Returns the command timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BlenderConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    DEFAULT_BLENDER_PORT
}

const fn default_timeout_secs() -> u64 {
    180
}

/// Retention policy for generation jobs nobody imports.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobsConfig {
    /// Maximum number of jobs tracked at once. The oldest is evicted beyond this.
    #[serde(default = "default_max_tracked")]
    pub max_tracked: usize,

    /// Jobs older than this many seconds are pruned on the next submission.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl JobsConfig {
    /// Returns the retention window as a [`Duration`].
    #[must_use]
    pub const fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_tracked: default_max_tracked(),
            retention_secs: default_retention_secs(),
        }
    }
}

const fn default_max_tracked() -> usize {
    64
}

const fn default_retention_secs() -> u64 {
    24 * 60 * 60
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
