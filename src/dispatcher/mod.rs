//! Dispatcher: routes tasks from the intake queue to idle executors.
//!
//! # Architecture
//!
//! ```text
//!  submit() ──▶ ┌──────────────┐      ┌────────────────┐
//!               │ intake queue │─────▶│ dispatch loop  │◀── throttle tick
//!               └──────────────┘      └───────┬────────┘
//!                                             │ takes one ready mailbox
//!                    ┌────────────────────────┴──────────┐
//!                    │  readiness pool (idle mailboxes)  │
//!                    └──▲──────────────▲──────────────▲──┘
//!                  ┌────┴────┐    ┌────┴────┐    ┌────┴────┐
//!                  │ Exec 0  │    │ Exec 1  │    │ Exec 2  │ ...
//!                  └────┬────┘    └────┬────┘    └────┬────┘
//!                       └──────────────┴──────────────┘
//!                                      │ completed tasks (optional)
//!                              ┌───────▼───────┐
//!                              │  report loop  │──▶ reporter(task)
//!                              └───────────────┘
//! ```
//!
//! Waiting for a ready mailbox is the back-pressure point: a task leaves the
//! intake queue only when some executor is idle.
//!
//! # Shutdown
//!
//! `stop` cancels the dispatcher token. The dispatch loop then closes the
//! intake queue, dispatches everything already buffered, cancels every
//! executor and waits for each to acknowledge its exit. Executors stop only
//! at idle boundaries, so running tasks always finish. The reporting queue
//! closes with the last executor and the report loop drains it.

mod report;
mod throttle;

pub use report::Reporter;

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

use crate::config::PoolConfig;
use crate::error::{PodError, PodResult};
use crate::executor::{Executor, Mailbox, ReportSink, WorkerContext};
use crate::task::Task;
use crate::tracker::Tracker;

use self::throttle::Throttle;

const NOT_STARTED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// A task on its way through the intake queue.
struct Submission {
    task: Task,
    /// Set for synchronous handoff: fired once a worker holds the task.
    accepted: Option<oneshot::Sender<()>>,
}

/// Routes submitted tasks to a fixed set of executors.
pub struct Dispatcher {
    config: PoolConfig,
    pool_name: Arc<str>,
    priority: Arc<AtomicU64>,
    state: AtomicU8,
    intake_tx: mpsc::Sender<Submission>,
    intake_rx: Mutex<Option<mpsc::Receiver<Submission>>>,
    tracker: Arc<Tracker>,
    report_tracker: Arc<Tracker>,
    reporter: Option<Reporter>,
    shutdown: CancellationToken,
    dispatch_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Create a dispatcher. Nothing runs until [`run`](Self::run).
    ///
    /// Tasks submitted before `run` wait in the intake queue.
    pub fn new(config: PoolConfig) -> Self {
        // A zero-capacity queue is a single slot plus an acceptance handshake
        let (intake_tx, intake_rx) = mpsc::channel(config.queue_capacity.max(1));

        Self {
            pool_name: Arc::from(config.name.as_str()),
            priority: Arc::new(AtomicU64::new(config.priority as u64)),
            state: AtomicU8::new(NOT_STARTED),
            intake_tx,
            intake_rx: Mutex::new(Some(intake_rx)),
            tracker: Arc::new(Tracker::new()),
            report_tracker: Arc::new(Tracker::new()),
            reporter: None,
            shutdown: CancellationToken::new(),
            dispatch_handle: Mutex::new(None),
            config,
        }
    }

    /// Route every completed task to `reporter`.
    pub fn with_reporter<F>(mut self, reporter: F) -> Self
    where
        F: Fn(Task) + Send + Sync + 'static,
    {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.config.workers()
    }

    /// Set how many dispatches may bypass the rate limiter.
    ///
    /// Negative values clamp to 0. Takes effect on the next dispatch, also
    /// while running.
    pub fn set_priority(&self, priority: i64) {
        self.priority
            .store(priority.max(0) as u64, Ordering::SeqCst);
    }

    pub fn priority(&self) -> u64 {
        self.priority.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) == RUNNING
    }

    /// Returns true once `stop` has been called.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STOPPED
    }

    /// Tasks submitted but not yet executed and released.
    pub fn pending(&self) -> usize {
        self.tracker.pending()
    }

    /// Completed tasks whose reporting call has not returned yet.
    pub fn reports_pending(&self) -> usize {
        self.report_tracker.pending()
    }

    /// Enqueue a task, waiting while the intake queue is full.
    ///
    /// With a zero-capacity queue this resolves only after a worker has
    /// accepted the task.
    pub async fn submit(&self, task: Task) -> PodResult<()> {
        let (submission, accepted) = self.prepare(task)?;

        if self.intake_tx.send(submission).await.is_err() {
            self.untrack();
            return Err(PodError::Closed);
        }
        if let Some(accepted) = accepted {
            if accepted.await.is_err() {
                self.untrack();
                return Err(PodError::Closed);
            }
        }
        Ok(())
    }

    /// Blocking variant of [`submit`](Self::submit) for synchronous callers.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_submit(&self, task: Task) -> PodResult<()> {
        let (submission, accepted) = self.prepare(task)?;

        if self.intake_tx.blocking_send(submission).is_err() {
            self.untrack();
            return Err(PodError::Closed);
        }
        if let Some(accepted) = accepted {
            if accepted.blocking_recv().is_err() {
                self.untrack();
                return Err(PodError::Closed);
            }
        }
        Ok(())
    }

    fn prepare(&self, task: Task) -> PodResult<(Submission, Option<oneshot::Receiver<()>>)> {
        if self.is_stopped() {
            return Err(PodError::Closed);
        }

        self.tracker.add();
        if self.reporter.is_some() {
            self.report_tracker.add();
        }

        let (accepted, rx) = if self.config.queue_capacity == 0 {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        Ok((Submission { task, accepted }, rx))
    }

    fn untrack(&self) {
        self.tracker.done();
        if self.reporter.is_some() {
            self.report_tracker.done();
        }
    }

    /// Start executors and the dispatch loop without rate limiting.
    pub fn run(&self) -> PodResult<()> {
        self.start(None)
    }

    /// Start executors and the dispatch loop, gating dispatch on `interval` ticks.
    pub fn run_with_limiter(&self, interval: Duration) -> PodResult<()> {
        self.start(Some(interval))
    }

    fn start(&self, interval: Option<Duration>) -> PodResult<()> {
        let runtime = Handle::try_current().map_err(|_| PodError::NoRuntime)?;

        match self
            .state
            .compare_exchange(NOT_STARTED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => {}
            Err(RUNNING) => return Err(PodError::AlreadyRunning),
            Err(_) => return Err(PodError::AlreadyStopped),
        }

        let Some(intake) = self
            .intake_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            self.state.store(STOPPED, Ordering::SeqCst);
            return Err(PodError::AlreadyStopped);
        };

        let workers = self.config.workers();
        let (ready_tx, ready_rx) = mpsc::channel(workers);

        let report = self.reporter.as_ref().map(|reporter| {
            let (tx, rx) = mpsc::unbounded_channel();
            runtime.spawn(report::report_loop(
                Arc::clone(&self.pool_name),
                rx,
                Arc::clone(reporter),
                Arc::clone(&self.report_tracker),
                self.config.report_concurrency(),
            ));
            ReportSink {
                tx,
                tracker: Arc::clone(&self.report_tracker),
            }
        });

        let ctx = WorkerContext {
            pool_name: Arc::clone(&self.pool_name),
            ready_tx,
            tracker: Arc::clone(&self.tracker),
            report,
            runtime: runtime.clone(),
        };

        // Separate from the dispatcher token: executors must outlive stop()
        // until the intake queue is drained
        let executor_stop = CancellationToken::new();
        let mut executors = Vec::with_capacity(workers);
        for id in 0..workers {
            match Executor::start(id, ctx.clone(), executor_stop.child_token()) {
                Ok(executor) => executors.push(executor),
                Err(e) => {
                    executor_stop.cancel();
                    self.state.store(STOPPED, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }
        // Executors now hold the only readiness and reporting senders
        drop(ctx);

        let priority = self.priority();
        let dispatch = DispatchLoop {
            pool_name: Arc::clone(&self.pool_name),
            intake,
            ready: ready_rx,
            executors,
            _executor_stop: executor_stop.drop_guard(),
            throttle_interval: interval,
            priority: Arc::clone(&self.priority),
            shutdown: self.shutdown.clone(),
            tracker: Arc::clone(&self.tracker),
            report_tracker: self
                .reporter
                .as_ref()
                .map(|_| Arc::clone(&self.report_tracker)),
        };
        let handle = runtime.spawn(dispatch.run());
        *self
            .dispatch_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!(
            pool = %self.pool_name,
            workers,
            capacity = self.config.queue_capacity,
            interval = ?interval,
            priority,
            reporting = self.reporter.is_some(),
            "dispatcher started"
        );
        Ok(())
    }

    /// Signal the dispatch loop to shut down.
    ///
    /// Returns immediately; use [`join`](Self::join) to wait for completion.
    pub fn stop(&self) -> PodResult<()> {
        self.state
            .compare_exchange(RUNNING, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| PodError::NotRunning)?;
        self.shutdown.cancel();
        Ok(())
    }

    /// Wait until the shutdown sequence has completed.
    ///
    /// Returns immediately if the dispatcher never started.
    pub async fn join(&self) {
        let handle = self
            .dispatch_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(pool = %self.pool_name, error = %e, "dispatch loop ended abnormally");
            }
        }
    }

    /// Wait until every submitted task has been executed and released.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    /// Wait until every reporting call has returned.
    pub async fn wait_reported(&self) {
        self.report_tracker.wait().await;
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// State owned by the dispatch loop task.
struct DispatchLoop {
    pool_name: Arc<str>,
    intake: mpsc::Receiver<Submission>,
    ready: mpsc::Receiver<Mailbox>,
    executors: Vec<Executor>,
    /// Cancels every executor if the loop is dropped mid-flight.
    _executor_stop: DropGuard,
    throttle_interval: Option<Duration>,
    /// Shared with [`Dispatcher::set_priority`].
    priority: Arc<AtomicU64>,
    shutdown: CancellationToken,
    tracker: Arc<Tracker>,
    report_tracker: Option<Arc<Tracker>>,
}

impl DispatchLoop {
    async fn run(mut self) {
        let mut throttle = Throttle::new(self.throttle_interval, Arc::clone(&self.priority));
        debug!(
            pool = %self.pool_name,
            limited = throttle.is_limited(),
            burst = self.priority.load(Ordering::SeqCst),
            "dispatch loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                submission = self.intake.recv() => match submission {
                    Some(submission) => self.dispatch(submission, &mut throttle).await,
                    // Every sender is gone: the dispatcher was dropped
                    None => break,
                },
            }
        }

        self.drain_and_stop(&mut throttle).await;
    }

    /// Hand one task to an idle executor.
    async fn dispatch(&mut self, submission: Submission, throttle: &mut Throttle) {
        let Submission { mut task, accepted } = submission;
        let mut admitted = false;

        loop {
            let Some(mailbox) = self.ready.recv().await else {
                self.discard(task, accepted);
                return;
            };

            if !admitted {
                if throttle.admit().await {
                    trace!(pool = %self.pool_name, task = task.id(), "dispatch waited for tick");
                }
                admitted = true;
            }

            // The executor is parked on its empty mailbox, so this never waits
            match mailbox.tx.try_send(task) {
                Ok(()) => {
                    trace!(pool = %self.pool_name, worker = mailbox.worker, "task dispatched");
                    if let Some(accepted) = accepted {
                        let _ = accepted.send(());
                    }
                    return;
                }
                Err(mpsc::error::TrySendError::Closed(t) | mpsc::error::TrySendError::Full(t)) => {
                    debug!(
                        pool = %self.pool_name,
                        worker = mailbox.worker,
                        "stale readiness entry skipped"
                    );
                    task = t;
                }
            }
        }
    }

    fn discard(&self, task: Task, accepted: Option<oneshot::Sender<()>>) {
        warn!(pool = %self.pool_name, task = task.id(), "no executor left, task dropped");
        // A waiting submitter sees the dropped handshake and untracks itself
        if accepted.is_none() {
            self.tracker.done();
            if let Some(ref report_tracker) = self.report_tracker {
                report_tracker.done();
            }
        }
    }

    async fn drain_and_stop(mut self, throttle: &mut Throttle) {
        self.intake.close();

        let mut drained = 0usize;
        while let Some(submission) = self.intake.recv().await {
            self.dispatch(submission, throttle).await;
            drained += 1;
        }

        for executor in &self.executors {
            // Busy executors exit once their current task is released
            if !executor.stop() {
                debug!(pool = %self.pool_name, worker = executor.id(), "waiting for running task");
                executor.cancel();
            }
        }
        join_all(self.executors.iter_mut().map(|e| e.stopped())).await;

        info!(
            pool = %self.pool_name,
            workers = self.executors.len(),
            drained,
            "dispatcher stopped"
        );
    }
}
