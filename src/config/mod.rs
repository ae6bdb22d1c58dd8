//! Configuration management for rlaunch

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::availability::DEFAULT_POLL_INTERVAL;
use crate::registry::RegistryHandle;
use crate::session::BackoffPolicy;
use crate::Result;

use file::{CommandFileConfig, LaunchConfigFile};

/// Registry URI used when none is configured
pub const DEFAULT_REGISTRY_URI: &str = "http://localhost:11311/";

/// Environment variable overriding the registry URI
pub const REGISTRY_URI_ENV: &str = "RLAUNCH_MASTER_URI";

/// Environment variable overriding the session log root
pub const LOG_DIR_ENV: &str = "RLAUNCH_LOG_DIR";

const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(2);

/// Lower bound for probe and retry delays
const MIN_RETRY_DELAY: Duration = Duration::from_millis(1);

/// Launcher configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Coordination registry address
    pub registry: RegistryHandle,

    /// Per-call registry timeout
    pub rpc_timeout: Duration,

    /// Interval between availability probes
    pub poll_interval: Duration,

    /// Backoff between session lookups while waiting for the registry
    pub backoff: BackoffPolicy,

    /// Root directory for session logs
    pub log_dir: PathBuf,

    /// External runtime commands
    pub runtime: RuntimeConfig,
}

/// Commands the parent and child runtimes hand off to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Parent runtime
    pub parent: Option<RuntimeCommand>,
    /// Child runtime
    pub child: Option<RuntimeCommand>,
}

/// A program and its leading arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeCommand {
    /// Executable to run
    pub program: String,
    /// Arguments placed before the launcher's own
    pub args: Vec<String>,
}

impl From<CommandFileConfig> for RuntimeCommand {
    fn from(fc: CommandFileConfig) -> Self {
        Self {
            program: fc.program,
            args: fc.args,
        }
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// An explicitly named config file must exist and parse; the default
    /// location is optional.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file is unusable or a value is invalid
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = match config_path {
            Some(path) => file::load_config_file_from(path)?,
            None => file::load_config_file(),
        };

        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the registry URI is invalid
    pub fn from_sources(
        fc: LaunchConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let uri = env(REGISTRY_URI_ENV)
            .or(fc.registry.uri)
            .unwrap_or_else(|| DEFAULT_REGISTRY_URI.to_string());
        let registry = RegistryHandle::parse(&uri)?;

        let log_dir = env(LOG_DIR_ENV)
            .or(fc.logging.dir)
            .map_or_else(default_log_dir, PathBuf::from);

        let defaults = BackoffPolicy::default();
        let backoff = BackoffPolicy {
            base_delay: fc
                .backoff
                .base_ms
                .map_or(defaults.base_delay, Duration::from_millis)
                .max(MIN_RETRY_DELAY),
            max_delay: fc
                .backoff
                .max_ms
                .map_or(defaults.max_delay, Duration::from_millis)
                .max(MIN_RETRY_DELAY),
        };

        Ok(Self {
            registry,
            rpc_timeout: fc
                .registry
                .timeout_ms
                .map_or(DEFAULT_RPC_TIMEOUT, Duration::from_millis),
            poll_interval: fc
                .registry
                .poll_interval_ms
                .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis)
                .max(MIN_RETRY_DELAY),
            backoff,
            log_dir,
            runtime: RuntimeConfig {
                parent: fc.runtime.parent.map(RuntimeCommand::from),
                child: fc.runtime.child.map(RuntimeCommand::from),
            },
        })
    }
}

/// Default session log root: `~/.rlaunch/log`
fn default_log_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || std::env::temp_dir().join("rlaunch").join("log"),
        |dirs| dirs.home_dir().join(".rlaunch").join("log"),
    )
}
