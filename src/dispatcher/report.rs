//! Reporting pipeline: hands completed tasks to the user-supplied sink.
//!
//! Executors push tasks onto an unbounded queue and never wait on it, so a
//! slow sink cannot stall workers. The loop below bounds how many sink
//! invocations run at once; tasks beyond that wait in the queue.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

use crate::task::Task;
use crate::tracker::{DoneGuard, Tracker};

/// Reporting sink, invoked once per completed task on tokio's blocking pool.
pub type Reporter = Arc<dyn Fn(Task) + Send + Sync + 'static>;

pub(crate) async fn report_loop(
    pool: Arc<str>,
    mut rx: mpsc::UnboundedReceiver<Task>,
    reporter: Reporter,
    tracker: Arc<Tracker>,
    concurrency: usize,
) {
    let limit = Arc::new(Semaphore::new(concurrency));
    debug!(pool = %pool, concurrency, "report loop started");

    // Ends once every executor has exited and dropped its sender
    while let Some(task) = rx.recv().await {
        let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
            tracker.done();
            continue;
        };
        let reporter = Arc::clone(&reporter);
        let tracker = Arc::clone(&tracker);

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _done = DoneGuard(&tracker);
            reporter(task);
        });
    }

    debug!(pool = %pool, "report loop stopped");
}
