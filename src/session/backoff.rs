//! Exponential backoff between registry retries

use std::time::{Duration, SystemTime};

/// Backoff policy for retrying an unreachable registry
///
/// Retries are unbounded; the wait ends on success or cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    /// Compute the delay before retry number `attempt` (zero-based)
    ///
    /// `min(base_delay * 2^attempt + jitter, max_delay)`, with jitter of
    /// 0-25% of the doubled delay taken from the system clock's subsecond
    /// nanos.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);

        let jitter_nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();

        let jitter_fraction = f64::from(jitter_nanos % 250) / 1000.0;

        (base + base.mul_f64(jitter_fraction)).min(self.max_delay)
    }
}
