//! External process handoff

use std::path::Path;

use tokio::process::Command;

use crate::config::RuntimeCommand;
use crate::{Error, Result};

/// Environment variable carrying the session identifier
pub const RUN_ID_ENV: &str = "RLAUNCH_RUN_ID";

/// Environment variable carrying the registry URI
pub const MASTER_URI_ENV: &str = "RLAUNCH_MASTER_URI";

/// Environment variable carrying the session log file
pub const LOG_FILE_ENV: &str = "RLAUNCH_LOG_FILE";

/// Status reported when the child was killed by a signal or the code does not fit
const FALLBACK_STATUS: u8 = 1;

/// A fully assembled external invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    /// Executable to run
    pub program: String,
    /// Full argument list
    pub args: Vec<String>,
    /// Extra environment
    pub env: Vec<(String, String)>,
}

impl Handoff {
    /// Start from a configured command, appending `args`
    #[must_use]
    pub fn new(command: &RuntimeCommand, args: impl IntoIterator<Item = String>) -> Self {
        Self {
            program: command.program.clone(),
            args: command.args.iter().cloned().chain(args).collect(),
            env: Vec::new(),
        }
    }

    /// Add an environment variable
    #[must_use]
    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }

    /// Add the session log file, if there is one
    #[must_use]
    pub fn log_file(self, path: Option<&Path>) -> Self {
        match path {
            Some(path) => self.env(LOG_FILE_ENV, path.display().to_string()),
            None => self,
        }
    }

    /// Run to completion with inherited stdio, returning its exit status
    ///
    /// # Errors
    ///
    /// Returns error if the program cannot be started
    pub async fn status(&self) -> Result<u8> {
        tracing::debug!(program = %self.program, args = ?self.args, "handing off to runtime");

        let status = Command::new(&self.program)
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .status()
            .await
            .map_err(|e| Error::Runtime(format!("failed to start '{}': {e}", self.program)))?;

        Ok(status
            .code()
            .and_then(|c| u8::try_from(c).ok())
            .unwrap_or(FALLBACK_STATUS))
    }
}
