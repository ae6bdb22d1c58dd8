//! Session-scoped log correlation
//!
//! Each process of a session writes to
//! `<log_root>/<session>/rlaunch-<host>-<pid>.log`, so logs of one session
//! from every host end up grouped under the same directory name.

use std::fmt::Debug;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};

use crate::session::SessionId;
use crate::{Error, Result};

/// Destination for the `info` and `error` channels of a session
pub trait LogSink: Debug + Send + Sync {
    /// Record an informational message
    fn info(&self, message: &str);

    /// Record an error message
    fn error(&self, message: &str);

    /// Backing file, if any
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn info(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}

/// Append-only session log file
#[derive(Debug)]
pub struct FileLogSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLogSink {
    /// Open (or create) `path` for appending, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    fn write_line(&self, level: &str, message: &str) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let Ok(mut file) = self.file.lock() else {
            return;
        };
        if let Err(e) = writeln!(file, "{timestamp} [{level}] {message}") {
            tracing::debug!(path = %self.path.display(), error = %e, "failed to write session log");
        }
    }
}

impl LogSink for FileLogSink {
    fn info(&self, message: &str) {
        self.write_line("INFO", message);
    }

    fn error(&self, message: &str) {
        self.write_line("ERROR", message);
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Compose the session log path
///
/// # Errors
///
/// Returns error if the session id is not a single plain path component
pub fn log_file_path(
    log_root: &Path,
    session: &SessionId,
    host: &str,
    pid: u32,
) -> Result<PathBuf> {
    let id = session.as_str();
    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(dir)), None) if dir == id => {
            Ok(log_root.join(dir).join(format!("rlaunch-{host}-{pid}.log")))
        }
        _ => Err(Error::Session(format!(
            "session id {id:?} cannot be used as a log directory name"
        ))),
    }
}

/// Name of the local host
///
/// # Errors
///
/// Returns error if the host name cannot be read or is not valid UTF-8
pub fn host_identity() -> Result<String> {
    let name = hostname::get()?;
    name.into_string()
        .map_err(|raw| Error::Config(format!("host name is not valid UTF-8: {raw:?}")))
}

/// Set up the session log
///
/// # Errors
///
/// Returns error if the session id would escape `log_root` or the log
/// destination cannot be created. Callers decide whether to continue without
/// a log file.
pub fn initialize(
    log_root: &Path,
    session: &SessionId,
    host: &str,
    pid: u32,
) -> Result<FileLogSink> {
    FileLogSink::open(log_file_path(log_root, session, host, pid)?)
}
