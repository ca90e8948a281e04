//! Configuration module for tokio_pod.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_pod::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Workers: {}", config.pool.workers());
//! ```

mod error;
mod logging;
mod parse;
mod pool;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::{env_parse, parse_duration};
pub use pool::{PoolConfig, DEFAULT_INTERVAL, DEFAULT_POOL_NAME};

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Worker pool configuration.
    pub pool: PoolConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            pool: PoolConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Pool: {}", self.pool.name);
        info!("  Workers: {}", self.pool.workers());

        if self.pool.queue_capacity == 0 {
            info!("  Intake queue: synchronous handoff");
        } else {
            info!("  Intake queue capacity: {}", self.pool.queue_capacity);
        }

        match self.pool.interval {
            Some(interval) => info!(
                "  Dispatch interval: {:?} (burst {})",
                interval, self.pool.priority
            ),
            None => info!("  Dispatch interval: disabled"),
        }

        info!("  Report concurrency: {}", self.pool.report_concurrency());
        info!("  Log format: {:?}", self.logging.format);
    }
}
