//! The snapshot cell: a lock-free, atomically-swapped immutable map of
//! expanded descriptors.
//!
//! Reads never block a concurrent refresh and vice versa. A refresh builds
//! an entirely new map and swaps it in by reference identity (compare-and-
//! set); a losing CAS means another refresh won the race and the loser
//! retries from its own "read current snapshot" step, never re-fetching
//! from the provider.

use crate::model::{EntryId, ExpandedDescriptor, Snapshot};
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Holds the cache's current snapshot behind an atomic pointer swap.
pub struct SnapshotCell {
    inner: ArcSwap<Snapshot>,
}

impl SnapshotCell {
    /// Start with an empty snapshot.
    pub fn new() -> Self {
        SnapshotCell {
            inner: ArcSwap::from_pointee(Snapshot::new()),
        }
    }

    /// Current snapshot, cheap to clone (an `Arc` bump).
    pub fn load(&self) -> Arc<Snapshot> {
        self.inner.load_full()
    }

    /// Attempt to replace `expected` with `updated`. Returns `true` if the
    /// swap won the race (i.e. the cell still held `expected` by reference
    /// identity at the moment of the swap), `false` if a concurrent refresh
    /// already replaced it.
    ///
    /// On failure the caller should re-read [`Self::load`] and recompute
    /// `updated`, not repeat the fetch that produced it, per §4.3.
    pub fn compare_and_set(&self, expected: &Arc<Snapshot>, updated: Snapshot) -> bool {
        let updated = Arc::new(updated);
        let previous = self.inner.compare_and_swap(expected, updated);
        Arc::ptr_eq(&previous, expected)
    }

    /// Replace the snapshot unconditionally with an empty one. Used by
    /// `reset()`.
    pub fn clear(&self) {
        self.inner.store(Arc::new(Snapshot::new()));
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry a compare-and-set until it succeeds, recomputing the replacement
/// map from the latest snapshot each time `rebuild` is called. `rebuild`
/// receives the current snapshot and returns the map to attempt to install.
///
/// Logs a warning on every lost race, per the teacher's convention of
/// `warn!`-ing on conditions that are handled but noteworthy.
pub fn cas_retry_loop(
    cell: &SnapshotCell,
    mut rebuild: impl FnMut(&Snapshot) -> Snapshot,
) -> Arc<Snapshot> {
    loop {
        let current = cell.load();
        let updated = rebuild(&current);
        if cell.compare_and_set(&current, updated) {
            return cell.load();
        }
        warn!("snapshot CAS lost race, retrying from latest snapshot");
    }
}

/// Look up a single entry by id.
pub fn get(snapshot: &Snapshot, id: &EntryId) -> Option<Arc<ExpandedDescriptor>> {
    snapshot.get(id).cloned()
}
