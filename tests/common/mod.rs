//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rlaunch::config::file::LaunchConfigFile;
use rlaunch::{Config, RegistryClient, RegistryError};
use serde_json::Value;

/// Scripted in-memory registry that counts calls
#[derive(Debug)]
pub struct FakeRegistry {
    lookups: Mutex<VecDeque<Result<Value, RegistryError>>>,
    otherwise: Result<Value, RegistryError>,
    down_for_pings: usize,
    get_calls: AtomicUsize,
    ping_calls: AtomicUsize,
}

impl FakeRegistry {
    /// Registry that stores `value` under every key
    pub fn with_value(value: &str) -> Self {
        Self::new(Ok(Value::from(value)))
    }

    /// Registry that refuses every connection
    pub fn unreachable() -> Self {
        Self::new(Err(RegistryError::Unreachable("connection refused".into())))
    }

    /// Registry that answers every lookup with a protocol error
    pub fn rejecting(message: &str) -> Self {
        Self::new(Err(RegistryError::Protocol {
            code: -1,
            message: message.to_string(),
        }))
    }

    fn new(otherwise: Result<Value, RegistryError>) -> Self {
        Self {
            lookups: Mutex::new(VecDeque::new()),
            otherwise,
            down_for_pings: 0,
            get_calls: AtomicUsize::new(0),
            ping_calls: AtomicUsize::new(0),
        }
    }

    /// Answer the next lookups from `replies` before falling back
    pub fn then(self, replies: impl IntoIterator<Item = Result<Value, RegistryError>>) -> Self {
        self.lookups.lock().unwrap().extend(replies);
        self
    }

    /// Fail the first `n` liveness calls
    pub fn down_for(mut self, n: usize) -> Self {
        self.down_for_pings = n;
        self
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn ping_calls(&self) -> usize {
        self.ping_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.get_calls() + self.ping_calls()
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn get_value(&self, _namespace: &str, _key: &str) -> Result<Value, RegistryError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.lookups.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.otherwise.clone())
    }

    async fn ping(&self) -> Result<u32, RegistryError> {
        let n = self.ping_calls.fetch_add(1, Ordering::SeqCst);
        if n < self.down_for_pings {
            Err(RegistryError::Unreachable("connection refused".into()))
        } else {
            Ok(1234)
        }
    }
}

/// Configuration with fast timings and logs under `log_dir`
pub fn test_config(log_dir: &Path) -> Config {
    let mut config = Config::from_sources(LaunchConfigFile::default(), |_| None)
        .expect("default config is valid");
    config.log_dir = log_dir.to_path_buf();
    config.poll_interval = Duration::from_millis(1);
    config.backoff.base_delay = Duration::from_millis(1);
    config.backoff.max_delay = Duration::from_millis(5);
    config
}
