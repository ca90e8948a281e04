//! Job capability and the uniform job failure carrier.
//!
//! A job is any value that can be executed once and then release whatever it
//! holds. Closures returning [`JobResult`] are jobs too, which keeps small
//! workloads free of boilerplate:
//!
//! ```rust,ignore
//! pod.add_job(|| -> JobResult {
//!     std::thread::sleep(Duration::from_millis(10));
//!     Ok(())
//! })
//! .await?;
//! ```

use std::any::Any;
use std::fmt;

/// Result of a single job operation.
pub type JobResult = Result<(), JobError>;

/// Unit of work accepted by a [`Pod`](crate::Pod).
///
/// `execute` runs first; `release` always runs afterwards on the same worker,
/// even when `execute` failed.
pub trait Job: Send + 'static {
    /// Perform the work.
    fn execute(&mut self) -> JobResult;

    /// Free resources held by the job.
    fn release(&mut self) -> JobResult {
        Ok(())
    }
}

impl<F> Job for F
where
    F: FnMut() -> JobResult + Send + 'static,
{
    fn execute(&mut self) -> JobResult {
        self()
    }
}

/// Failure reported by a job operation.
///
/// Failures are informational: they are recorded on the task and handed to
/// the reporting sink, never retried and never returned to the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobError {
    pub message: String,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build an error from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self {
            message: format!("job panicked: {}", detail),
        }
    }

    /// Returns true if this error came from a panic inside the job.
    pub fn is_panic(&self) -> bool {
        self.message.starts_with("job panicked: ")
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for JobError {}

impl From<String> for JobError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for JobError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl From<std::io::Error> for JobError {
    fn from(err: std::io::Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}
