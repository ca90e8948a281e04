//! tokio_pod - Bounded worker pool driven by a Tokio dispatcher.
//!
//! Jobs submitted to a [`Pod`] are queued, handed one at a time to idle
//! executor threads, optionally paced by a rate limiter, and reported to an
//! optional sink once they have run.
//!
//! # Features
//!
//! - **Bounded concurrency**: never more jobs in flight than executors
//! - **Rate limiting**: fixed dispatch interval with a startup burst
//! - **Graceful shutdown**: running jobs finish, buffered jobs still run
//! - **Decoupled reporting**: a slow sink never stalls the executors
//! - **Structured logging**: text or JSON output via tracing
//!
//! # Architecture
//!
//! - [`Pod`] - Lifecycle facade over one dispatcher
//! - [`Dispatcher`] - Intake queue, readiness pool and dispatch loop
//! - Executors - OS threads running one job at a time
//! - [`Task`] - A job plus its timing and outcome
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_pod::{JobResult, Pod};
//!
//! let pod = Pod::new(10).with_reporter(|task| {
//!     println!("task {} took {:?}", task.id(), task.elapsed());
//! });
//! pod.start()?;
//! pod.add_job(|| -> JobResult { Ok(()) }).await?;
//! pod.wait_reported().await;
//! pod.shutdown().await?;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars), empty when unavailable
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod dispatcher;
pub mod error;
mod executor;
pub mod job;
pub mod logging;
pub mod pod;
pub mod task;
pub mod tracker;

// Re-exports for convenience
pub use config::{Config, PoolConfig};
pub use dispatcher::{Dispatcher, Reporter};
pub use error::{PodError, PodResult};
pub use job::{Job, JobError, JobResult};
pub use pod::Pod;
pub use task::Task;
pub use tracker::Tracker;
