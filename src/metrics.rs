//! Metrics hooks for the materialization cache.
//!
//! Mirrors the teacher's `CacheMetrics` shape: default bodies log via the
//! `log` facade, so a caller who doesn't care about metrics still gets
//! visibility for free.

/// Trait for cache metrics collection. Implement this to wire the cache's
/// internal events into a real metrics sink (Prometheus, StatsD, etc).
pub trait MetricsSink: Send + Sync {
    /// Record an error encountered while refreshing a single entry, tagged
    /// by reason class and whether it was classified source-down, matching
    /// `mat-cache-errors`'s tag set (spec.md §6).
    fn record_error(&self, id: &str, error: &str, source_down: bool) {
        warn!(
            "materialization cache error for {} (source_down={}): {}",
            id, source_down, error
        );
    }

    /// Record that an entry's retry budget was exhausted and it escalated
    /// to `FAILED`. `source_down` distinguishes the (never-escalated)
    /// source-down case from everything else, matching §4.7's metric tag.
    fn record_retry_failed(&self, id: &str, source_down: bool) {
        warn!(
            "materialization cache retry-failed for {} (source_down={})",
            id, source_down
        );
    }

    /// Record that a refresh cycle completed, with its wall-clock duration.
    /// `initial` tags the very first refresh since construction, per
    /// `mat-cache-sync`'s `initial=true|false` tag.
    fn record_sync(&self, duration: std::time::Duration, initial: bool) {
        debug!(
            "materialization cache refresh completed in {:?} (initial={})",
            duration, initial
        );
    }

    /// Report the current snapshot size.
    fn set_entries_gauge(&self, count: usize) {
        debug!("materialization cache entries: {}", count);
    }
}

/// Default metrics implementation (no-op beyond logging).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl MetricsSink for NoOpMetrics {}
