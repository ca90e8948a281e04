//! Task: a submitted job plus the timing and outcome the worker records.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::job::{Job, JobError, JobResult};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// A job bound for one run through the pool.
///
/// Created fresh per submission. Timing and outcome fields are written only by
/// the executor that runs the task, once each: `started_at` before `execute`,
/// `finished_at` after it, then the release outcome.
pub struct Task {
    id: u64,
    job: Box<dyn Job>,
    started_at: Option<SystemTime>,
    finished_at: Option<SystemTime>,
    execute_result: Option<JobResult>,
    release_result: Option<JobResult>,
}

impl Task {
    pub fn new(job: Box<dyn Job>) -> Self {
        Self {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            job,
            started_at: None,
            finished_at: None,
            execute_result: None,
            release_result: None,
        }
    }

    /// Creation sequence number, unique within the process.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Start time in Unix seconds, once the task has begun.
    pub fn start_time(&self) -> Option<u64> {
        self.started_at.map(unix_secs)
    }

    /// End time in Unix seconds, once `execute` has returned.
    pub fn end_time(&self) -> Option<u64> {
        self.finished_at.map(unix_secs)
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<SystemTime> {
        self.finished_at
    }

    /// Wall-clock time spent in `execute`.
    pub fn elapsed(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end.duration_since(start).unwrap_or_default()),
            _ => None,
        }
    }

    pub fn execute_result(&self) -> Option<&JobResult> {
        self.execute_result.as_ref()
    }

    pub fn release_result(&self) -> Option<&JobResult> {
        self.release_result.as_ref()
    }

    /// First failure recorded for this task, if any.
    pub fn error(&self) -> Option<&JobError> {
        [&self.execute_result, &self.release_result]
            .into_iter()
            .find_map(|r| r.as_ref().and_then(|r| r.as_ref().err()))
    }

    /// Returns true once both operations ran and neither failed.
    pub fn is_success(&self) -> bool {
        matches!(
            (&self.execute_result, &self.release_result),
            (Some(Ok(())), Some(Ok(())))
        )
    }

    pub(crate) fn job_mut(&mut self) -> &mut dyn Job {
        self.job.as_mut()
    }

    pub(crate) fn mark_started(&mut self) {
        self.started_at = Some(SystemTime::now());
    }

    pub(crate) fn mark_finished(&mut self, result: JobResult) {
        self.finished_at = Some(SystemTime::now());
        self.execute_result = Some(result);
    }

    pub(crate) fn mark_released(&mut self, result: JobResult) {
        self.release_result = Some(result);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("start_time", &self.start_time())
            .field("end_time", &self.end_time())
            .field("execute_result", &self.execute_result)
            .field("release_result", &self.release_result)
            .finish_non_exhaustive()
    }
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
