//! Worker pool configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use super::parse::{env_duration, env_opt, env_or, env_parse};
use super::ConfigError;

/// Default dispatch interval between rate-limited handoffs.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2);

/// Default pool name, used for thread names and log fields.
pub const DEFAULT_POOL_NAME: &str = "pod";

/// Immutable pool configuration.
///
/// Built once and handed to [`Dispatcher::new`](crate::Dispatcher::new) or
/// [`Pod::from_config`](crate::Pod::from_config); runtime state lives elsewhere.
///
/// ```rust,ignore
/// use std::time::Duration;
/// use tokio_pod::PoolConfig;
///
/// let config = PoolConfig::new(8)
///     .with_queue_capacity(64)
///     .with_interval(Duration::from_millis(5))
///     .with_priority(16);
/// ```
///
/// # Environment Variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `POD_WORKERS` | `0` | Worker count, 0 = CPU count |
/// | `POD_QUEUE_CAPACITY` | _(workers)_ | Intake buffer, 0 = synchronous handoff |
/// | `POD_INTERVAL` | `2ms` | Dispatch interval, `off` disables rate limiting |
/// | `POD_PRIORITY` | `0` | Dispatches exempt from rate limiting at startup |
/// | `POD_REPORT_CONCURRENCY` | _(workers)_ | Max concurrent reporting calls |
/// | `POD_NAME` | `pod` | Pool name for threads and logs |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Resolved worker count (never zero).
    workers: NonZeroUsize,
    /// Intake queue capacity. 0 = submitter waits until a worker accepts.
    pub queue_capacity: usize,
    /// Dispatch interval. None disables rate limiting.
    pub interval: Option<Duration>,
    /// Number of dispatches allowed to bypass the rate limiter.
    pub priority: usize,
    /// Max concurrent reporting sink invocations (never zero).
    report_concurrency: NonZeroUsize,
    /// Pool name.
    pub name: String,
}

impl PoolConfig {
    /// Create a configuration for `workers` executors (0 = CPU count).
    pub fn new(workers: usize) -> Self {
        let workers = resolve_workers(workers);
        Self {
            workers,
            queue_capacity: workers.get(),
            interval: Some(DEFAULT_INTERVAL),
            priority: 0,
            report_concurrency: workers,
            name: DEFAULT_POOL_NAME.to_string(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let workers: usize = env_parse("POD_WORKERS", 0)?;
        let mut config = Self::new(workers);

        config.queue_capacity = env_parse("POD_QUEUE_CAPACITY", config.workers())?;
        config.interval = env_duration("POD_INTERVAL", "2ms")?;
        config.priority = env_parse("POD_PRIORITY", 0)?;

        if let Some(raw) = env_opt("POD_REPORT_CONCURRENCY") {
            let n: usize = raw.parse().map_err(|e| ConfigError::Parse {
                key: "POD_REPORT_CONCURRENCY".into(),
                value: raw.clone(),
                error: format!("{e}"),
            })?;
            config.report_concurrency =
                NonZeroUsize::new(n).ok_or_else(|| ConfigError::Invalid {
                    key: "POD_REPORT_CONCURRENCY".into(),
                    message: "report concurrency cannot be zero".into(),
                })?;
        }

        config.name = env_or("POD_NAME", DEFAULT_POOL_NAME);
        if config.name.is_empty() {
            return Err(ConfigError::Invalid {
                key: "POD_NAME".into(),
                message: "pool name cannot be empty".into(),
            });
        }

        Ok(config)
    }

    /// Get worker count (pre-computed, zero-cost).
    #[inline]
    pub fn workers(&self) -> usize {
        self.workers.get()
    }

    /// Get reporting concurrency cap.
    #[inline]
    pub fn report_concurrency(&self) -> usize {
        self.report_concurrency.get()
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval).filter(|d| !d.is_zero());
        self
    }

    pub fn without_interval(mut self) -> Self {
        self.interval = None;
        self
    }

    pub fn with_priority(mut self, priority: usize) -> Self {
        self.priority = priority;
        self
    }

    /// Cap concurrent reporting calls. 0 resets to the worker count.
    pub fn with_report_concurrency(mut self, concurrency: usize) -> Self {
        self.report_concurrency = NonZeroUsize::new(concurrency).unwrap_or(self.workers);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Resolve 0 to CPU count.
fn resolve_workers(workers: usize) -> NonZeroUsize {
    NonZeroUsize::new(workers)
        .or_else(|| NonZeroUsize::new(num_cpus::get()))
        .unwrap_or(NonZeroUsize::MIN)
}
