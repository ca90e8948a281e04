//! Test helpers and utilities

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_pod::{Job, JobResult, PoolConfig, Task};

/// Tracks how many jobs run at once.
#[derive(Clone, Default)]
pub struct Probe {
    inner: Arc<ProbeInner>,
}

#[derive(Default)]
struct ProbeInner {
    current: AtomicUsize,
    peak: AtomicUsize,
    finished: AtomicUsize,
}

#[allow(dead_code)]
impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    /// A job that sleeps for `duration` while counted as in flight.
    pub fn job(&self, duration: Duration) -> impl Job {
        let inner = Arc::clone(&self.inner);
        move || -> JobResult {
            let now = inner.current.fetch_add(1, Ordering::SeqCst) + 1;
            inner.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(duration);
            inner.current.fetch_sub(1, Ordering::SeqCst);
            inner.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.inner.current.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.inner.finished.load(Ordering::SeqCst)
    }
}

/// Job that counts how often each of its operations ran.
pub struct CountingJob {
    pub executed: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl Job for CountingJob {
    fn execute(&mut self) -> JobResult {
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) -> JobResult {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Reporting sink that keeps every task it receives.
#[derive(Clone, Default)]
pub struct Collector {
    tasks: Arc<Mutex<Vec<Task>>>,
}

#[allow(dead_code)]
impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> impl Fn(Task) + Send + Sync + 'static {
        let tasks = Arc::clone(&self.tasks);
        move |task| tasks.lock().unwrap().push(task)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn take(&self) -> Vec<Task> {
        std::mem::take(&mut *self.tasks.lock().unwrap())
    }
}

/// Pool config without rate limiting.
#[allow(dead_code)]
pub fn unthrottled(workers: usize) -> PoolConfig {
    PoolConfig::new(workers).without_interval()
}

/// Poll `condition` every millisecond until it holds or `timeout` elapses.
#[allow(dead_code)]
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    condition()
}
