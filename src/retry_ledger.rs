//! The retry ledger: records the first time each entry failed expansion,
//! so the refresh engine can tell whether an entry's retry budget is spent.
//!
//! Mirrors the teacher's in-memory backend's lazy-expiry idiom: entries
//! carry their own expiry and are dropped on next access rather than swept
//! by a background task.

use crate::model::EntryId;
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct Record {
    first_failure_at: Instant,
    expires_at: Instant,
}

/// Tracks per-entry first-failure timestamps with write-time expiry.
pub struct RetryLedger {
    records: DashMap<EntryId, Record>,
    max_retry: Duration,
}

impl RetryLedger {
    /// `max_retry` is the ledger's own lifetime ceiling (spec.md's
    /// `MaxRetryHours + 1`); callers compare elapsed time against their own
    /// shorter `retry_minutes` window to decide when to escalate.
    pub fn new(max_retry: Duration) -> Self {
        RetryLedger {
            records: DashMap::new(),
            max_retry: max_retry + Duration::from_secs(3600),
        }
    }

    /// Record a failure for `id` if this is the first one seen (or the
    /// previous record already expired). Returns the first-failure time.
    pub fn record_failure(&self, id: &EntryId) -> Instant {
        let now = Instant::now();
        let expires_at = now + self.max_retry;

        if let Some(existing) = self.records.get(id) {
            if existing.expires_at > now {
                return existing.first_failure_at;
            }
        }

        self.records.insert(
            id.clone(),
            Record {
                first_failure_at: now,
                expires_at,
            },
        );
        now
    }

    /// The time of `id`'s first recorded, unexpired failure, if any.
    pub fn first_failure_time(&self, id: &EntryId) -> Option<Instant> {
        let now = Instant::now();
        match self.records.get(id) {
            Some(record) if record.expires_at > now => Some(record.first_failure_at),
            Some(_) => {
                self.records.remove(id);
                None
            }
            None => None,
        }
    }

    /// Clear a successfully-resolved (or force-escalated) entry's record.
    pub fn clear(&self, id: &EntryId) {
        self.records.remove(id);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_returns_none_before_any_failure() {
        let ledger = RetryLedger::new(Duration::from_secs(3600));
        assert!(ledger.first_failure_time(&EntryId::from("e1")).is_none());
    }

    #[test]
    fn record_failure_is_idempotent_on_first_timestamp() {
        let ledger = RetryLedger::new(Duration::from_secs(3600));
        let id = EntryId::from("e1");

        let first = ledger.record_failure(&id);
        std::thread::sleep(Duration::from_millis(5));
        let second = ledger.record_failure(&id);

        assert_eq!(first, second);
    }

    #[test]
    fn clear_removes_the_record() {
        let ledger = RetryLedger::new(Duration::from_secs(3600));
        let id = EntryId::from("e1");
        ledger.record_failure(&id);
        assert!(ledger.first_failure_time(&id).is_some());

        ledger.clear(&id);
        assert!(ledger.first_failure_time(&id).is_none());
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn record_failure_after_clear_starts_a_fresh_timestamp() {
        let ledger = RetryLedger::new(Duration::from_secs(3600));
        let id = EntryId::from("e1");
        ledger.record_failure(&id);
        ledger.clear(&id);

        let refreshed = ledger.record_failure(&id);
        assert_eq!(ledger.first_failure_time(&id), Some(refreshed));
    }
}
