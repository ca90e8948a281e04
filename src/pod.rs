//! Pod: lifecycle and job submission over one dispatcher.
//!
//! ```text
//! NotStarted ──start()──▶ Running ──stop()──▶ Stopped
//! ```
//!
//! A stopped pod never runs again; build a new one instead.

use std::time::Duration;

use crate::config::PoolConfig;
use crate::dispatcher::Dispatcher;
use crate::error::PodResult;
use crate::job::Job;
use crate::task::Task;

/// Bounded pool of workers executing submitted jobs.
///
/// # Example
///
/// ```rust,ignore
/// use tokio_pod::{JobResult, Pod};
///
/// let pod = Pod::new(10);
/// pod.start()?;
/// for i in 0..100 {
///     pod.add_job(move || -> JobResult {
///         println!("job {}", i);
///         Ok(())
///     })
///     .await?;
/// }
/// pod.wait().await;
/// pod.shutdown().await?;
/// ```
pub struct Pod {
    dispatcher: Dispatcher,
    interval: Option<Duration>,
}

impl Pod {
    /// Create a pod with `workers` executors, a matching intake buffer and
    /// the default 2ms dispatch interval.
    pub fn new(workers: usize) -> Self {
        Self::from_config(PoolConfig::new(workers))
    }

    /// Create a pod with a custom dispatch interval.
    pub fn with_interval(workers: usize, interval: Duration) -> Self {
        Self::from_config(PoolConfig::new(workers).with_interval(interval))
    }

    pub fn from_config(config: PoolConfig) -> Self {
        let interval = config.interval;
        Self {
            dispatcher: Dispatcher::new(config),
            interval,
        }
    }

    /// Route every completed task to `reporter`, off the worker threads.
    pub fn with_reporter<F>(mut self, reporter: F) -> Self
    where
        F: Fn(Task) + Send + Sync + 'static,
    {
        self.dispatcher = self.dispatcher.with_reporter(reporter);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// Start the dispatcher. Must be called from within a tokio runtime.
    pub fn start(&self) -> PodResult<()> {
        match self.interval {
            Some(interval) => self.dispatcher.run_with_limiter(interval),
            None => self.dispatcher.run(),
        }
    }

    /// Signal shutdown. Running jobs finish; buffered jobs are still dispatched.
    pub fn stop(&self) -> PodResult<()> {
        self.dispatcher.stop()
    }

    /// Wait for the shutdown sequence started by [`stop`](Self::stop).
    pub async fn join(&self) {
        self.dispatcher.join().await;
    }

    /// Stop and wait until every executor has exited.
    pub async fn shutdown(&self) -> PodResult<()> {
        self.stop()?;
        self.join().await;
        Ok(())
    }

    /// Submit one job, waiting while the intake queue is full.
    pub async fn add_job<J: Job>(&self, job: J) -> PodResult<()> {
        self.dispatcher.submit(Task::new(Box::new(job))).await
    }

    /// Submit jobs one after another, stopping at the first rejection.
    pub async fn add_jobs<I>(&self, jobs: I) -> PodResult<()>
    where
        I: IntoIterator,
        I::Item: Job,
    {
        for job in jobs {
            self.add_job(job).await?;
        }
        Ok(())
    }

    /// Blocking variant of [`add_job`](Self::add_job) for threads outside the runtime.
    pub fn blocking_add_job<J: Job>(&self, job: J) -> PodResult<()> {
        self.dispatcher.blocking_submit(Task::new(Box::new(job)))
    }

    /// Jobs submitted but not yet executed and released.
    pub fn pending(&self) -> usize {
        self.dispatcher.pending()
    }

    /// Wait until every submitted job has been executed and released.
    pub async fn wait(&self) {
        self.dispatcher.wait().await;
    }

    /// Wait until every reporting call has returned.
    pub async fn wait_reported(&self) {
        self.dispatcher.wait_reported().await;
    }
}
