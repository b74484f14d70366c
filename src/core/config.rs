//! # Global engine configuration.
//!
//! Provides [`Config`] centralized settings for the execution pool.
//!
//! Config is used in two ways:
//! 1. **Pool creation**: `ExecutionPool::builder(config)`
//! 2. **JobSpec defaults**: `JobSpec::with_defaults(script, &config)`
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no global semaphore created)
//! - `log_retention = 0` → keep every log file

use std::{path::PathBuf, time::Duration};

use crate::jobs::Interpreter;

/// Global configuration for the execution pool.
///
/// ## Field semantics
/// - `log_dir`: directory holding `<job_id>.log` files (created on demand)
/// - `kill_grace`: wait between graceful termination and forced kill of an aborted child
/// - `grace`: maximum wait for jobs to stop during [`shutdown`](crate::ExecutionPool::shutdown)
/// - `max_concurrent`: job concurrency limit (`0` = unlimited)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped)
/// - `interpreter`: default launcher for [`JobSpec::with_defaults`](crate::JobSpec::with_defaults)
/// - `log_retention`: number of newest log files to keep (`0` = keep all)
///
/// All fields are public. Prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory for per-job log files.
    pub log_dir: PathBuf,

    /// Grace period between the graceful termination signal and the forced kill.
    pub kill_grace: Duration,

    /// Maximum time [`shutdown`](crate::ExecutionPool::shutdown) waits for jobs to end.
    pub grace: Duration,

    /// Maximum number of jobs running child processes at once.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = at most `n` jobs run simultaneously; others wait queued
    pub max_concurrent: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers that lag behind more than `bus_capacity` messages skip older items.
    pub bus_capacity: usize,

    /// Interpreter used by `JobSpec::with_defaults` (`None` executes scripts directly).
    pub interpreter: Option<Interpreter>,

    /// Number of newest `*.log` files kept in `log_dir` (`0` = keep all).
    pub log_retention: usize,
}

impl Config {
    /// Returns the global concurrency limit as an `Option`.
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the log retention limit as an `Option` (`None` = keep all).
    #[inline]
    pub fn retention_limit(&self) -> Option<usize> {
        if self.log_retention == 0 {
            None
        } else {
            Some(self.log_retention)
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `log_dir = "logs"`
    /// - `kill_grace = 200ms`
    /// - `grace = 5s`
    /// - `max_concurrent = 0` (unlimited)
    /// - `bus_capacity = 1024`
    /// - `interpreter = None` (scripts executed directly)
    /// - `log_retention = 0` (keep all)
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            kill_grace: Duration::from_millis(200),
            grace: Duration::from_secs(5),
            max_concurrent: 0,
            bus_capacity: 1024,
            interpreter: None,
            log_retention: 0,
        }
    }
}
