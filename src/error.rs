//! Pod lifecycle error types.

use std::fmt;

/// Errors returned to callers of the pod and dispatcher API.
///
/// All of them are recoverable: none leaves the pool in a corrupted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodError {
    /// `start` was called outside a tokio runtime.
    NoRuntime,

    /// `start` was called on a pod that is already running.
    AlreadyRunning,

    /// `start` was called on a pod that has been stopped. Pods never restart.
    AlreadyStopped,

    /// `stop` was called on a pod that is not running.
    NotRunning,

    /// The intake queue is closed; the pod is shutting down or gone.
    Closed,

    /// An executor thread could not be spawned.
    WorkerSpawn(String),
}

impl PodError {
    /// Check if this error comes from calling the lifecycle API out of order.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            PodError::AlreadyRunning | PodError::AlreadyStopped | PodError::NotRunning
        )
    }

    /// Check if this is a closed intake error.
    pub fn is_closed(&self) -> bool {
        matches!(self, PodError::Closed)
    }

    /// Get the error message for logging.
    pub fn message(&self) -> &str {
        match self {
            PodError::NoRuntime => "No runtime",
            PodError::AlreadyRunning => "Already running",
            PodError::AlreadyStopped => "Already stopped",
            PodError::NotRunning => "Not running",
            PodError::Closed => "Intake closed",
            PodError::WorkerSpawn(msg) => msg,
        }
    }
}

impl fmt::Display for PodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PodError::NoRuntime => {
                write!(f, "pod must be started from within a tokio runtime")
            }
            PodError::AlreadyRunning => {
                write!(f, "pod dispatcher was already started")
            }
            PodError::AlreadyStopped => {
                write!(f, "pod dispatcher was stopped and cannot be restarted")
            }
            PodError::NotRunning => {
                write!(f, "pod dispatcher is not running")
            }
            PodError::Closed => {
                write!(f, "pod intake queue is closed")
            }
            PodError::WorkerSpawn(msg) => {
                write!(f, "failed to spawn worker: {}", msg)
            }
        }
    }
}

impl std::error::Error for PodError {}

/// Result type alias for pod operations.
pub type PodResult<T> = Result<T, PodError>;
