//! Completion counter for "all submitted work finished" signalling.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Counts outstanding units of work and wakes waiters when it reaches zero.
///
/// Incremented on submission, decremented from worker threads and reporting
/// tasks, so every operation is lock-free.
#[derive(Debug, Default)]
pub struct Tracker {
    pending: AtomicUsize,
    notify: Notify,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Mark one unit finished. Extra calls at zero are ignored.
    pub fn done(&self) {
        let prev = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if prev == Ok(1) {
            self.notify.notify_waiters();
        }
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Resolves once the counter is zero.
    pub async fn wait(&self) {
        loop {
            // Register before checking so a concurrent `done` cannot slip between.
            let notified = self.notify.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Calls [`Tracker::done`] when dropped, including during unwinding.
pub(crate) struct DoneGuard<'a>(pub(crate) &'a Tracker);

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}
