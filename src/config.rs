//! Configuration snapshot for a [`crate::cache::MaterializationCache`].
//!
//! Built once from an [`crate::collaborators::OptionManager`] at
//! construction time, mirroring the teacher's `OperationConfig` builder
//! idiom (`with_*` methods consuming and returning `Self`).

use crate::collaborators::OptionManager;
use std::time::Duration;

/// Resolved configuration for one cache instance. Captured once at
/// construction; the cache does not re-read the option manager on every
/// refresh.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub cache_enabled: bool,
    pub init_timeout: Duration,
    pub retry: Duration,
    pub max_retry: Duration,
}

impl CacheConfig {
    /// Snapshot the current values from an option manager.
    pub fn from_options(options: &impl OptionManager) -> Self {
        CacheConfig {
            cache_enabled: options.cache_enabled(),
            init_timeout: Duration::from_secs(options.init_timeout_seconds()),
            retry: Duration::from_secs(options.retry_minutes() * 60),
            max_retry: Duration::from_secs(options.max_retry_hours() * 3600),
        }
    }

    /// Override the retry window. Used by tests that need a shorter window
    /// than the 15-minute default to exercise escalation without sleeping.
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            cache_enabled: true,
            init_timeout: Duration::from_secs(60),
            retry: Duration::from_secs(15 * 60),
            max_retry: Duration::from_secs(4 * 3600),
        }
    }
}
