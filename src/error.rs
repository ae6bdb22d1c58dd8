//! Error types for rlaunch

use thiserror::Error;

use crate::role::UsageError;

/// Result type alias for rlaunch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while bootstrapping a launch session
#[derive(Debug, Error)]
pub enum Error {
    /// Contradictory or incomplete command line
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Registry answered but rejected the request
    #[error("registry error (code {code}): {message}")]
    RegistryProtocol {
        /// Status code reported by the registry
        code: i64,
        /// Message reported by the registry
        message: String,
    },

    /// Session identifier could not be established
    #[error("session error: {0}")]
    Session(String),

    /// Runtime handoff failed
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Bootstrap was cancelled before it finished
    #[error("bootstrap cancelled")]
    Cancelled,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a failure is reported at the process boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    /// Print usage and exit with the usage status
    Usage,
    /// Recognized failure, logged to the error channel
    Domain,
    /// Interrupted by the user
    Cancelled,
    /// Anything else; full diagnostic is printed
    Unclassified,
}

impl Error {
    /// Classify this error for exit-status reporting
    #[must_use]
    pub const fn exit_class(&self) -> ExitClass {
        match self {
            Self::Usage(_) => ExitClass::Usage,
            Self::RegistryProtocol { .. }
            | Self::Session(_)
            | Self::Runtime(_)
            | Self::Config(_) => ExitClass::Domain,
            Self::Cancelled => ExitClass::Cancelled,
            Self::Io(_) => ExitClass::Unclassified,
        }
    }
}
