//! The init barrier: a one-shot latch that opens after the cache's first
//! refresh completes (success or failure) and never closes again.
//!
//! `getAll`-style readers wait up to a configured timeout; `update`-style
//! readers wait up to a fixed ten-minute ceiling and proceed anyway if that
//! specific wait times out, per spec.md §4.5.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::time::Duration;

/// Ten-minute ceiling `update()` waits before proceeding regardless of
/// whether the barrier has opened, per spec.md §4.5.
pub const UPDATE_WAIT_CEILING: Duration = Duration::from_secs(600);

pub struct InitBarrier {
    opened: AtomicBool,
    notify: Notify,
}

impl InitBarrier {
    /// A closed barrier. Use [`Self::pre_opened`] when `cache_enabled` is
    /// `false`, so readers never block on a refresh that will never run.
    pub fn new() -> Self {
        InitBarrier {
            opened: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// A barrier that starts open.
    pub fn pre_opened() -> Self {
        let barrier = Self::new();
        barrier.open();
        barrier
    }

    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    /// Open the barrier if it isn't already. Idempotent: once open, it
    /// never closes again.
    pub fn open(&self) {
        if !self.opened.swap(true, Ordering::AcqRel) {
            self.notify.notify_waiters();
        }
    }

    /// Wait for the barrier to open, up to `timeout`. Returns `true` if the
    /// barrier is open (whether it already was, or opened during the
    /// wait), `false` if the timeout elapsed first.
    pub async fn wait(&self, timeout: Duration) -> bool {
        if self.is_open() {
            return true;
        }

        let notified = self.notify.notified();
        tokio::select! {
            _ = notified => self.is_open(),
            _ = tokio::time::sleep(timeout) => self.is_open(),
        }
    }
}

impl Default for InitBarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_barrier_is_closed() {
        let barrier = InitBarrier::new();
        assert!(!barrier.is_open());
    }

    #[test]
    fn pre_opened_barrier_is_open() {
        let barrier = InitBarrier::pre_opened();
        assert!(barrier.is_open());
    }

    #[test]
    fn open_is_idempotent() {
        let barrier = InitBarrier::new();
        barrier.open();
        barrier.open();
        assert!(barrier.is_open());
    }

    #[tokio::test]
    async fn wait_returns_true_immediately_if_already_open() {
        let barrier = InitBarrier::pre_opened();
        let opened = barrier.wait(Duration::from_millis(10)).await;
        assert!(opened);
    }

    #[tokio::test]
    async fn wait_times_out_on_a_barrier_that_never_opens() {
        let barrier = InitBarrier::new();
        let opened = barrier.wait(Duration::from_millis(20)).await;
        assert!(!opened);
    }

    #[tokio::test]
    async fn wait_wakes_up_when_another_task_opens_the_barrier() {
        let barrier = std::sync::Arc::new(InitBarrier::new());
        let opener = barrier.clone();

        let waiter = tokio::spawn(async move { barrier.wait(Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        opener.open();

        let opened = waiter.await.expect("waiter task panicked");
        assert!(opened);
    }
}
