//! Error types used by the jobvisor engine and its jobs.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] - errors raised by the engine surface itself (submission, shutdown, ids).
//! - [`JobError`] - failures contained inside one job; they never leave the job and are
//!   rendered into an [`EventKind::JobError`](crate::EventKind::JobError) event instead.
//!
//! Both types provide `as_label` for logs/metrics.

use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::jobs::JobId;

/// # Errors produced by the engine surface.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A job identifier was not a non-empty `[A-Za-z0-9_-]` token.
    #[error("invalid job id {id:?}")]
    InvalidJobId {
        /// The rejected input.
        id: String,
    },

    /// The pool is shutting down and no longer accepts submissions.
    #[error("execution pool is shutting down")]
    ShuttingDown,

    /// Shutdown grace period was exceeded; some jobs were still registered.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Jobs that did not reach a terminal state in time.
        stuck: Vec<JobId>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use jobvisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::ShuttingDown.as_label(), "runtime_shutting_down");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::InvalidJobId { .. } => "runtime_invalid_job_id",
            RuntimeError::ShuttingDown => "runtime_shutting_down",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Failures of a single job.
///
/// Abort is not an error: it is a distinct terminal outcome and never appears here.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum JobError {
    /// The child process could not be started (missing executable, permissions, ...).
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that was being launched.
        program: String,
        #[source]
        source: io::Error,
    },

    /// The per-job log file could not be created or written.
    #[error("log file {}: {source}", path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading the child's output or waiting for it failed.
    #[error("output capture failed: {source}")]
    Capture {
        #[source]
        source: io::Error,
    },

    /// The child exited with a nonzero code.
    #[error("exit code {code}")]
    ExitCode { code: i32 },

    /// The child was terminated by a signal nobody in the engine sent.
    #[error("terminated by signal {signal}")]
    Signaled { signal: i32 },

    /// The supervisor itself panicked.
    #[error("supervisor panicked: {info}")]
    Panicked { info: String },
}

impl JobError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use jobvisor::JobError;
    ///
    /// let err = JobError::ExitCode { code: 3 };
    /// assert_eq!(err.as_label(), "job_exit_code");
    /// assert_eq!(err.to_string(), "exit code 3");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::Spawn { .. } => "job_spawn",
            JobError::Log { .. } => "job_log",
            JobError::Capture { .. } => "job_capture",
            JobError::ExitCode { .. } => "job_exit_code",
            JobError::Signaled { .. } => "job_signaled",
            JobError::Panicked { .. } => "job_panicked",
        }
    }

    /// Exit code carried by the error, if the child exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            JobError::ExitCode { code } => Some(*code),
            _ => None,
        }
    }
}
