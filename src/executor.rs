//! Executor: one pool slot running tasks on a dedicated thread.
//!
//! # Worker loop
//!
//! ```text
//!        ┌──────────────────────────────────────────────┐
//!        ▼                                              │
//!  advertise mailbox ──▶ wait: task | stop ──task──▶ execute ──▶ release
//!  (readiness pool)            │                        (forward to reporting)
//!                              └──stop──▶ exit + ack
//! ```
//!
//! Jobs are blocking, so every executor owns an OS thread. Waiting for the next
//! task or the stop signal is done on the runtime handle captured at start.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{PodError, PodResult};
use crate::job::{JobError, JobResult};
use crate::task::Task;
use crate::tracker::{DoneGuard, Tracker};

/// Private single-slot handoff queue of one executor.
///
/// Registered into the readiness pool every time the executor becomes idle.
#[derive(Debug)]
pub(crate) struct Mailbox {
    pub(crate) worker: usize,
    pub(crate) tx: mpsc::Sender<Task>,
}

/// Reporting pipeline endpoint handed to executors.
#[derive(Clone)]
pub(crate) struct ReportSink {
    pub(crate) tx: mpsc::UnboundedSender<Task>,
    pub(crate) tracker: Arc<Tracker>,
}

/// Everything an executor shares with its dispatcher.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub(crate) pool_name: Arc<str>,
    pub(crate) ready_tx: mpsc::Sender<Mailbox>,
    pub(crate) tracker: Arc<Tracker>,
    pub(crate) report: Option<ReportSink>,
    pub(crate) runtime: Handle,
}

/// A worker that runs at most one task at a time.
pub(crate) struct Executor {
    id: usize,
    idle: Arc<AtomicBool>,
    stop: CancellationToken,
    exited: Option<oneshot::Receiver<()>>,
}

impl Executor {
    /// Spawn the worker thread. The executor advertises itself immediately.
    pub(crate) fn start(
        id: usize,
        ctx: WorkerContext,
        stop: CancellationToken,
    ) -> PodResult<Self> {
        let idle = Arc::new(AtomicBool::new(true));
        let (exit_tx, exit_rx) = oneshot::channel();
        let thread_name = format!("{}-{}", ctx.pool_name, id);

        let worker = Worker {
            id,
            idle: Arc::clone(&idle),
            stop: stop.clone(),
            ctx,
        };

        thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let _ack = ExitAck(Some(exit_tx));
                worker.run();
            })
            .map_err(|e| PodError::WorkerSpawn(format!("executor {}: {}", id, e)))?;

        Ok(Self {
            id,
            idle,
            stop,
            exited: Some(exit_rx),
        })
    }

    #[inline]
    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Returns true while the executor is not running a task.
    #[inline]
    pub(crate) fn is_idle(&self) -> bool {
        self.idle.load(Ordering::SeqCst)
    }

    /// Request termination if the executor is idle.
    ///
    /// Returns false, doing nothing, while a task is running.
    pub(crate) fn stop(&self) -> bool {
        if self.is_idle() {
            self.stop.cancel();
            true
        } else {
            false
        }
    }

    /// Request termination at the next idle boundary, whatever the current state.
    pub(crate) fn cancel(&self) {
        self.stop.cancel();
    }

    /// Resolves once the worker thread has left its loop.
    pub(crate) async fn stopped(&mut self) {
        if let Some(rx) = self.exited.take() {
            let _ = rx.await;
        }
    }
}

/// State moved onto the worker thread.
struct Worker {
    id: usize,
    idle: Arc<AtomicBool>,
    stop: CancellationToken,
    ctx: WorkerContext,
}

impl Worker {
    fn run(self) {
        let (tx, mut rx) = mpsc::channel::<Task>(1);
        debug!(pool = %self.ctx.pool_name, worker = self.id, "executor started");

        loop {
            let mailbox = Mailbox {
                worker: self.id,
                tx: tx.clone(),
            };
            if self.ctx.ready_tx.blocking_send(mailbox).is_err() {
                // Readiness pool closed, dispatcher is gone
                break;
            }

            let next = self.ctx.runtime.block_on(async {
                tokio::select! {
                    biased;
                    task = rx.recv() => task,
                    _ = self.stop.cancelled() => None,
                }
            });

            let Some(task) = next else {
                break;
            };

            self.idle.store(false, Ordering::SeqCst);
            self.process(task);
            self.idle.store(true, Ordering::SeqCst);
        }

        debug!(pool = %self.ctx.pool_name, worker = self.id, "executor stopped");
    }

    fn process(&self, mut task: Task) {
        let _done = DoneGuard(&self.ctx.tracker);

        task.mark_started();
        let result = invoke(|| task.job_mut().execute());
        if let Err(ref e) = result {
            warn!(worker = self.id, task = task.id(), error = %e, "job execute failed");
        }
        task.mark_finished(result);

        let result = invoke(|| task.job_mut().release());
        if let Err(ref e) = result {
            warn!(worker = self.id, task = task.id(), error = %e, "job release failed");
        }
        task.mark_released(result);

        if let Some(ref report) = self.ctx.report {
            if let Err(mpsc::error::SendError(task)) = report.tx.send(task) {
                warn!(worker = self.id, task = task.id(), "reporting queue closed, report dropped");
                report.tracker.done();
            }
        }
    }
}

/// Run one job operation, turning a panic into a [`JobError`].
fn invoke(op: impl FnOnce() -> JobResult) -> JobResult {
    panic::catch_unwind(AssertUnwindSafe(op)).unwrap_or_else(|p| Err(JobError::from_panic(p)))
}

/// Signals worker exit when dropped, even if the thread unwinds.
struct ExitAck(Option<oneshot::Sender<()>>);

impl Drop for ExitAck {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}
