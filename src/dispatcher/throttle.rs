//! Dispatch throttle: a tick-gated rate limiter with a startup burst.
//!
//! The first `burst` dispatches pass straight through. Every later dispatch
//! waits for the next tick of the interval. The counter is clamped at `burst`
//! once the limiter engages, so the bypass is not regained over time.
//!
//! `burst` is shared with the dispatcher and re-read on every dispatch, so a
//! raised burst opens the bypass again for the difference.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

pub(crate) struct Throttle {
    ticker: Option<Interval>,
    burst: Arc<AtomicU64>,
    index: u64,
}

impl Throttle {
    /// Create a throttle. `None` disables rate limiting entirely.
    ///
    /// Must be called from within a tokio runtime when an interval is given.
    pub(crate) fn new(interval: Option<Duration>, burst: Arc<AtomicU64>) -> Self {
        let ticker = interval.filter(|d| !d.is_zero()).map(|period| {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            // A consumer that falls behind sees one stored tick, not a backlog
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        Self {
            ticker,
            burst,
            index: 0,
        }
    }

    #[inline]
    pub(crate) fn is_limited(&self) -> bool {
        self.ticker.is_some()
    }

    /// Count one dispatch, waiting for a tick once the burst is spent.
    ///
    /// Returns true if the dispatch had to wait.
    pub(crate) async fn admit(&mut self) -> bool {
        self.index = self.index.saturating_add(1);
        let burst = self.burst.load(Ordering::SeqCst);
        match self.ticker {
            Some(ref mut ticker) if self.index > burst => {
                self.index = burst;
                ticker.tick().await;
                true
            }
            _ => false,
        }
    }
}
