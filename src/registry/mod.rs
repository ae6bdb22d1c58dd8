//! Coordination registry access
//!
//! The registry ("master") is the source of truth for shared session state
//! once it runs. This module only reads from it: one network round trip per
//! call, no retry, no caching.

mod http;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use http::HttpRegistryClient;

/// Status code the registry uses for a successful call
pub const SUCCESS_CODE: i64 = 1;

/// Failure of a single registry call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Connection-level failure; the registry may not be running yet
    #[error("registry unreachable: {0}")]
    Unreachable(String),

    /// The registry answered but reported failure
    #[error("registry protocol error (code {code}): {message}")]
    Protocol {
        /// Status code from the reply envelope
        code: i64,
        /// Message from the reply envelope
        message: String,
    },
}

impl RegistryError {
    /// Whether the failure is connection-level
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// Read access to the coordination registry
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Fetch `key` on behalf of `namespace`
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unreachable`] on connection failure and
    /// [`RegistryError::Protocol`] when the registry rejects the call
    async fn get_value(&self, namespace: &str, key: &str)
    -> Result<serde_json::Value, RegistryError>;

    /// Trivial liveness call returning the registry's process id
    ///
    /// # Errors
    ///
    /// Same as [`RegistryClient::get_value`]
    async fn ping(&self) -> Result<u32, RegistryError>;

    /// Whether the registry answers a trivial call right now
    async fn is_reachable(&self) -> bool {
        self.ping().await.is_ok()
    }
}

/// Address of the coordination registry, unset when none is configured
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistryHandle(Option<Url>);

impl RegistryHandle {
    /// Parse a registry URI; an empty string yields an unset handle
    ///
    /// # Errors
    ///
    /// Returns error if the URI is malformed or not `http`/`https`
    pub fn parse(uri: &str) -> crate::Result<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Ok(Self(None));
        }

        let url = Url::parse(uri)
            .map_err(|e| crate::Error::Config(format!("invalid registry uri '{uri}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(crate::Error::Config(format!(
                "registry uri '{uri}' must use http or https"
            )));
        }

        Ok(Self(Some(url)))
    }

    /// An unset handle
    #[must_use]
    pub const fn unset() -> Self {
        Self(None)
    }

    /// The registry URL, if known
    #[must_use]
    pub const fn url(&self) -> Option<&Url> {
        self.0.as_ref()
    }

    /// Port of the registry, if known
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.0.as_ref().and_then(Url::port_or_known_default)
    }
}

impl fmt::Display for RegistryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(url) => write!(f, "{url}"),
            None => write!(f, "<unset>"),
        }
    }
}
