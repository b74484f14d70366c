//! # Job lifecycle events.
//!
//! The [`EventKind`] enum classifies the six notifications a job produces or reacts to:
//! - **Lifecycle**: started, progress
//! - **Terminal**: finished, error, aborted
//! - **Control**: abort requested (published by anyone holding the job id)
//!
//! The [`Event`] struct carries the job id plus optional payload fields set
//! depending on the kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! For one job, events are published by a single producer in the order
//! `JobStarted → JobProgress* → {JobFinished | JobAborted | JobError} → JobProgress(100)`
//! (no trailing progress after `JobError`).
//!
//! ## Example
//! ```rust
//! use jobvisor::{Event, EventKind, JobId, Progress};
//!
//! let job = JobId::generate();
//! let ev = Event::progress(job.clone(), Progress::Percent(42), "Step 3 42%");
//!
//! assert_eq!(ev.kind, EventKind::JobProgress);
//! assert_eq!(ev.job, job);
//! assert_eq!(ev.progress, Some(Progress::Percent(42)));
//! assert_eq!(ev.message.as_deref(), Some("Step 3 42%"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::{error::JobError, jobs::JobId, jobs::Progress};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of job events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Job accepted by the pool; emitted exactly once, before the child is spawned.
    ///
    /// Sets:
    /// - `job`: job id
    /// - `script`: script name
    JobStarted,

    /// One line of captured output, or a synthetic start/summary line.
    ///
    /// Sets:
    /// - `job`: job id
    /// - `progress`: inferred percent or [`Progress::Unknown`]
    /// - `message`: the line
    JobProgress,

    /// Child exited with code 0 and no abort was honored.
    ///
    /// Sets:
    /// - `job`: job id
    JobFinished,

    /// Child exited nonzero, or spawn/capture failed.
    ///
    /// Sets:
    /// - `job`: job id
    /// - `message`: error text (`exit code <rc>` for abnormal exits)
    /// - `exit_code`: numeric code when the child exited on its own
    JobError,

    /// Someone asked for cancellation of the job.
    ///
    /// Sets:
    /// - `job`: job id
    AbortRequested,

    /// The supervisor honored an abort request and terminated the child.
    ///
    /// Sets:
    /// - `job`: job id
    JobAborted,
}

impl EventKind {
    /// True for `JobFinished`, `JobError` and `JobAborted`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EventKind::JobFinished | EventKind::JobError | EventKind::JobAborted
        )
    }
}

/// Job event with optional payload.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs/dashboards)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Job the event refers to.
    pub job: JobId,
    /// Script name (`JobStarted`).
    pub script: Option<Arc<str>>,
    /// Inferred progress (`JobProgress`).
    pub progress: Option<Progress>,
    /// Output line or error text.
    pub message: Option<Arc<str>>,
    /// Exit code of an abnormal exit (`JobError`).
    pub exit_code: Option<i32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind, job: JobId) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            job,
            script: None,
            progress: None,
            message: None,
            exit_code: None,
        }
    }

    /// Attaches a script name.
    #[inline]
    pub fn with_script(mut self, script: impl Into<Arc<str>>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// Attaches a progress value.
    #[inline]
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Attaches a message.
    #[inline]
    pub fn with_message(mut self, message: impl Into<Arc<str>>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    pub fn started(job: JobId, script: impl Into<Arc<str>>) -> Self {
        Event::new(EventKind::JobStarted, job).with_script(script)
    }

    pub fn progress(job: JobId, progress: Progress, message: impl Into<Arc<str>>) -> Self {
        Event::new(EventKind::JobProgress, job)
            .with_progress(progress)
            .with_message(message)
    }

    pub fn finished(job: JobId) -> Self {
        Event::new(EventKind::JobFinished, job)
    }

    /// Renders a contained job failure.
    pub fn error(job: JobId, err: &JobError) -> Self {
        let ev = Event::new(EventKind::JobError, job).with_message(err.to_string());
        match err.exit_code() {
            Some(code) => ev.with_exit_code(code),
            None => ev,
        }
    }

    pub fn abort_requested(job: JobId) -> Self {
        Event::new(EventKind::AbortRequested, job)
    }

    pub fn aborted(job: JobId) -> Self {
        Event::new(EventKind::JobAborted, job)
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let job = JobId::generate();
        let a = Event::finished(job.clone());
        let b = Event::aborted(job);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_error_event_carries_exit_code() {
        let ev = Event::error(JobId::generate(), &JobError::ExitCode { code: 7 });
        assert_eq!(ev.kind, EventKind::JobError);
        assert_eq!(ev.exit_code, Some(7));
        assert_eq!(ev.message.as_deref(), Some("exit code 7"));
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(EventKind::JobFinished.is_terminal());
        assert!(EventKind::JobAborted.is_terminal());
        assert!(EventKind::JobError.is_terminal());
        assert!(!EventKind::JobProgress.is_terminal());
        assert!(!EventKind::AbortRequested.is_terminal());
        assert!(!EventKind::JobStarted.is_terminal());
    }
}
