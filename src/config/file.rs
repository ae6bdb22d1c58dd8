//! TOML configuration file loading
//!
//! Supports `<config_dir>/rlaunch/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct LaunchConfigFile {
    /// Registry configuration
    #[serde(default)]
    pub registry: RegistryFileConfig,

    /// Session log configuration
    #[serde(default)]
    pub logging: LoggingFileConfig,

    /// Wait/retry timing
    #[serde(default)]
    pub backoff: BackoffFileConfig,

    /// External runtime commands
    #[serde(default)]
    pub runtime: RuntimeFileConfig,
}

/// Registry connection settings
#[derive(Debug, Default, Deserialize)]
pub struct RegistryFileConfig {
    /// Registry URI (e.g. "http://localhost:11311/")
    pub uri: Option<String>,

    /// Per-call timeout in milliseconds
    pub timeout_ms: Option<u64>,

    /// Interval between availability probes in milliseconds
    pub poll_interval_ms: Option<u64>,
}

/// Session log settings
#[derive(Debug, Default, Deserialize)]
pub struct LoggingFileConfig {
    /// Root directory for session logs
    pub dir: Option<String>,
}

/// Backoff between registry retries while waiting for it
#[derive(Debug, Default, Deserialize)]
pub struct BackoffFileConfig {
    pub base_ms: Option<u64>,
    pub max_ms: Option<u64>,
}

/// External runtime commands
#[derive(Debug, Default, Deserialize)]
pub struct RuntimeFileConfig {
    /// Parent runtime command
    pub parent: Option<CommandFileConfig>,

    /// Child runtime command
    pub child: Option<CommandFileConfig>,
}

/// A program and its leading arguments
#[derive(Debug, Default, Deserialize)]
pub struct CommandFileConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `LaunchConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> LaunchConfigFile {
    let Some(path) = config_file_path() else {
        return LaunchConfigFile::default();
    };

    if !path.exists() {
        return LaunchConfigFile::default();
    }

    match load_config_file_from(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            LaunchConfigFile::default()
        }
    }
}

/// Load a config file that was named explicitly
///
/// # Errors
///
/// Returns [`Error::Config`] if the file cannot be read or parsed
pub fn load_config_file_from(path: &Path) -> Result<LaunchConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
}

/// Return the config file path: `<config_dir>/rlaunch/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("rlaunch").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let file: LaunchConfigFile = toml::from_str(
            r#"
            [registry]
            uri = "http://master:11311/"

            [runtime.child]
            program = "/usr/bin/rlaunch-child"
            "#,
        )
        .unwrap();

        assert_eq!(file.registry.uri.as_deref(), Some("http://master:11311/"));
        assert!(file.registry.timeout_ms.is_none());
        let child = file.runtime.child.unwrap();
        assert_eq!(child.program, "/usr/bin/rlaunch-child");
        assert!(child.args.is_empty());
        assert!(file.runtime.parent.is_none());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_file_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("nope.toml")), "{err}");
        assert_eq!(err.exit_class(), crate::ExitClass::Domain);
    }

    #[test]
    fn explicit_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "registry = [").unwrap();
        let err = load_config_file_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("bad.toml")), "{err}");
    }
}
