//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk, parsing it
//! into validated, type-safe structures and layering environment overrides
//! on top.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path passed as the `CONFIG_FILE` CLI argument (must exist)
//! 2. Default location, if present:
//!    - **Linux/macOS:** `~/.blender-mcp-bridge/config.json`
//!    - **Windows:** `%USERPROFILE%\.blender-mcp-bridge\config.json`
//!
//! With neither, built-in defaults are used.
//!
//! # Environment
//!
//! - `BLENDER_HOST` overrides `blender.host`
//! - `BLENDER_PORT` overrides `blender.port`

mod settings;

pub use settings::{BlenderConfig, Config, JobsConfig, LoggingConfig, DEFAULT_BLENDER_PORT};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable overriding the add-on host.
pub const ENV_BLENDER_HOST: &str = "BLENDER_HOST";

/// Environment variable overriding the add-on port.
pub const ENV_BLENDER_PORT: &str = "BLENDER_PORT";

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.blender-mcp-bridge/`
/// - **Windows:** `%USERPROFILE%\.blender-mcp-bridge\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".blender-mcp-bridge"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads and parses the configuration file.
///
/// If `path` is `None`, the platform-specific default location is tried and
/// defaults are used when no file exists there. Environment overrides are
/// applied before validation.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - An environment override is malformed
/// - Required fields are missing or invalid
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => read_config_file(p)?,
        None => match default_config_path() {
            Some(p) if p.exists() => read_config_file(&p)?,
            _ => Config::default(),
        },
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    // Validate the configuration
    config.validate()?;

    Ok(config)
}

fn read_config_file(config_path: &Path) -> Result<Config, ConfigError> {
    if !config_path.exists() {
        return Err(ConfigError::NotFound {
            path: config_path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.to_path_buf(),
        source: e,
    })
}

/// Applies `BLENDER_HOST` / `BLENDER_PORT` overrides read through `lookup`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnv`] if the port is not a number in `1..=65535`.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup(ENV_BLENDER_HOST).filter(|h| !h.trim().is_empty()) {
        config.blender.host = host;
    }

    if let Some(raw) = lookup(ENV_BLENDER_PORT) {
        let port = raw
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or(ConfigError::InvalidEnv {
                name: ENV_BLENDER_PORT,
                value: raw.clone(),
            })?;
        config.blender.port = port;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_path_exists() {
        let path = default_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("config.json"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = load_config(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn explicit_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "blender": { "timeout_secs": 5 } }"#).unwrap();

        let mut config = read_config_file(&path).unwrap();
        apply_env_overrides(&mut config, |_| None).unwrap();
        assert_eq!(config.blender.timeout_secs, 5);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = read_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_host_and_port() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |name| match name {
            ENV_BLENDER_HOST => Some("10.0.0.2".to_string()),
            ENV_BLENDER_PORT => Some("9000".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.blender.host, "10.0.0.2");
        assert_eq!(config.blender.port, 9000);
    }

    #[test]
    fn env_rejects_bad_port() {
        for bad in ["abc", "0", "70000", ""] {
            let mut config = Config::default();
            let err = apply_env_overrides(&mut config, |name| {
                (name == ENV_BLENDER_PORT).then(|| bad.to_string())
            })
            .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidEnv { .. }), "{bad}");
        }
    }

    #[test]
    fn blank_env_host_is_ignored() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |name| {
            (name == ENV_BLENDER_HOST).then(|| "  ".to_string())
        })
        .unwrap();
        assert_eq!(config.blender.host, "localhost");
    }
}
