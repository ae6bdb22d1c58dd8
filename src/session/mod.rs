//! Session identifier negotiation
//!
//! Every process of one launch session shares a single identifier. Children
//! are handed it on the command line; a parent reads it from the registry if
//! one is already running, and otherwise mints a fresh one on the assumption
//! that it is about to start the registry itself.

mod backoff;

use std::fmt;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub use backoff::BackoffPolicy;

use crate::registry::{RegistryClient, RegistryError};
use crate::{Error, Result};

/// Registry namespace holding launcher state
pub const SESSION_NAMESPACE: &str = "/rlaunch";

/// Registry key holding the session identifier
pub const SESSION_KEY: &str = "/run_id";

/// Identifier shared by every process of one launch session
///
/// Never empty. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing identifier, rejecting empty strings
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() { None } else { Some(Self(id)) }
    }

    /// Mint a fresh, universally unique identifier
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Produce the session identifier for this invocation
///
/// Priority, highest first:
/// 1. `explicit_run_id`, returned without touching the network
/// 2. the value already published in the registry
/// 3. a fresh identifier, when the registry is unreachable and
///    `wait_for_master` is false
///
/// With `wait_for_master` set, an unreachable registry is retried with
/// `backoff` until it answers or `cancel` fires.
///
/// # Errors
///
/// Returns [`Error::RegistryProtocol`] if the registry rejects the lookup,
/// [`Error::Session`] if it returns an unusable value, and
/// [`Error::Cancelled`] if the wait is cancelled
pub async fn negotiate<C>(
    explicit_run_id: Option<&str>,
    wait_for_master: bool,
    client: &C,
    backoff: &BackoffPolicy,
    cancel: &CancellationToken,
) -> Result<SessionId>
where
    C: RegistryClient + ?Sized,
{
    if let Some(id) = explicit_run_id {
        return SessionId::new(id)
            .ok_or_else(|| Error::Session("explicit run id is empty".to_string()));
    }

    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match client.get_value(SESSION_NAMESPACE, SESSION_KEY).await {
            Ok(value) => {
                let id = session_from_value(value)?;
                tracing::debug!(session = %id, "using session id published by registry");
                return Ok(id);
            }
            Err(RegistryError::Protocol { code, message }) => {
                return Err(Error::RegistryProtocol { code, message });
            }
            Err(RegistryError::Unreachable(reason)) if !wait_for_master => {
                let id = SessionId::generate();
                tracing::debug!(session = %id, %reason, "registry unreachable, generated session id");
                return Ok(id);
            }
            Err(RegistryError::Unreachable(reason)) => {
                let delay = backoff.delay_for_attempt(attempt);
                tracing::debug!(attempt, ?delay, %reason, "registry unreachable, retrying session lookup");
                attempt = attempt.saturating_add(1);

                tokio::select! {
                    () = cancel.cancelled() => return Err(Error::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

fn session_from_value(value: Value) -> Result<SessionId> {
    match value {
        Value::String(s) => SessionId::new(s)
            .ok_or_else(|| Error::Session("registry returned an empty session id".to_string())),
        other => Err(Error::Session(format!(
            "registry returned a non-string session id: {other}"
        ))),
    }
}
