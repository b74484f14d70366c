//! # JobBoard – dashboard model of all jobs seen on the bus
//!
//! Maintains, per job id, what a dashboard row shows: script name, status,
//! last known percent, last message and timestamps. The view is built only
//! from events, so it may lag the engine slightly and only knows about jobs
//! whose events arrived after the board was attached.
//!
//! ## Rules
//! - Events for unknown job ids create a row with no script name.
//! - `JobProgress` with [`Progress::Unknown`] updates the message only.
//! - Events with `seq <= last_seq` for that job are **rejected** (stale).
//!   `AbortRequested` is exempt: abort issuers mint it on their own threads, so its
//!   `seq` can be lower than progress already applied. It never advances `last_seq`.
//! - Terminal status is sticky: later progress lines update percent/message only.
//!
//! ## Internal scheme
//! ```text
//! on_event(ev):
//!   ├─ JobStarted      => script = ev.script, status = Running
//!   ├─ JobProgress     => message = ev.message, percent = known(ev.progress)
//!   ├─ AbortRequested  => Running → AbortRequested
//!   ├─ JobFinished     => Finished
//!   ├─ JobAborted      => Aborted
//!   └─ JobError        => Failed(ev.message)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::jobs::{JobId, Progress};
use crate::subscribers::Subscribe;

/// Status column of a job row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    AbortRequested,
    Finished,
    Aborted,
    Failed(Arc<str>),
}

impl JobStatus {
    /// True once the job reached Finished, Aborted or Failed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Aborted | JobStatus::Failed(_)
        )
    }
}

/// One dashboard row.
#[derive(Debug, Clone)]
pub struct JobView {
    pub job: JobId,
    /// Script name, if `JobStarted` was observed.
    pub script: Option<Arc<str>>,
    pub status: JobStatus,
    /// Last known percentage.
    pub percent: Option<u8>,
    /// Last message (output line or summary).
    pub message: Option<Arc<str>>,
    /// Timestamp of the first event observed for the job.
    pub first_seen: SystemTime,
    /// Timestamp of the last applied event.
    pub updated_at: SystemTime,
    /// Sequence of the first event observed (row order).
    first_seq: u64,
    last_seq: u64,
}

impl JobView {
    fn new(ev: &Event) -> Self {
        Self {
            job: ev.job.clone(),
            script: None,
            status: JobStatus::Running,
            percent: None,
            message: None,
            first_seen: ev.at,
            updated_at: ev.at,
            first_seq: ev.seq,
            last_seq: 0,
        }
    }
}

/// Thread-safe dashboard model fed by the event stream.
pub struct JobBoard {
    rows: RwLock<HashMap<JobId, JobView>>,
    capacity: usize,
}

impl JobBoard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            capacity: 4096,
        }
    }

    /// Configure the queue capacity for this subscriber.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Applies one event; returns `false` if it was stale.
    pub fn apply(&self, ev: &Event) -> bool {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let row = rows
            .entry(ev.job.clone())
            .or_insert_with(|| JobView::new(ev));

        if ev.kind == EventKind::AbortRequested {
            if row.status == JobStatus::Running {
                row.status = JobStatus::AbortRequested;
                row.updated_at = ev.at;
            }
            return true;
        }
        if ev.seq <= row.last_seq {
            return false;
        }
        row.last_seq = ev.seq;
        row.updated_at = ev.at;

        match ev.kind {
            EventKind::JobStarted => {
                row.script = ev.script.clone();
            }
            EventKind::JobProgress => {
                if let Some(p) = ev.progress.and_then(Progress::percent) {
                    row.percent = Some(p);
                }
                if ev.message.is_some() {
                    row.message = ev.message.clone();
                }
            }
            EventKind::AbortRequested => {}
            EventKind::JobFinished => row.status = JobStatus::Finished,
            EventKind::JobAborted => row.status = JobStatus::Aborted,
            EventKind::JobError => {
                let msg = ev.message.clone().unwrap_or_else(|| Arc::from("unknown error"));
                row.status = JobStatus::Failed(msg);
            }
        }
        true
    }

    /// All rows, in order of first appearance.
    #[must_use]
    pub fn snapshot(&self) -> Vec<JobView> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let mut v: Vec<JobView> = rows.values().cloned().collect();
        v.sort_unstable_by_key(|r| r.first_seq);
        v
    }

    /// Row for one job, if any event for it was observed.
    #[must_use]
    pub fn get(&self, job: &JobId) -> Option<JobView> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job)
            .cloned()
    }

    /// Ids of jobs without a terminal status, in order of first appearance.
    #[must_use]
    pub fn running(&self) -> Vec<JobId> {
        self.snapshot()
            .into_iter()
            .filter(|r| !r.status.is_terminal())
            .map(|r| r.job)
            .collect()
    }
}

impl Default for JobBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscribe for JobBoard {
    async fn on_event(&self, ev: &Event) {
        self.apply(ev);
    }

    fn name(&self) -> &'static str {
        "JobBoard"
    }

    fn queue_capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;

    #[test]
    fn test_finished_job_row() {
        let board = JobBoard::new();
        let job = JobId::generate();

        board.apply(&Event::started(job.clone(), "backup.sh"));
        board.apply(&Event::progress(job.clone(), Progress::Percent(0), "starting"));
        board.apply(&Event::progress(job.clone(), Progress::Percent(40), "40%"));
        board.apply(&Event::progress(job.clone(), Progress::Unknown, "copying"));
        assert_eq!(board.running(), vec![job.clone()]);

        let row = board.get(&job).unwrap();
        assert_eq!(row.percent, Some(40));
        assert_eq!(row.message.as_deref(), Some("copying"));
        assert_eq!(row.script.as_deref(), Some("backup.sh"));

        board.apply(&Event::finished(job.clone()));
        board.apply(&Event::progress(job.clone(), Progress::DONE, "done in 0.4s"));

        let row = board.get(&job).unwrap();
        assert_eq!(row.status, JobStatus::Finished);
        assert_eq!(row.percent, Some(100));
        assert!(board.running().is_empty());
    }

    #[test]
    fn test_unknown_job_is_rendered_defensively() {
        let board = JobBoard::new();
        let job = JobId::generate();

        board.apply(&Event::error(job.clone(), &JobError::ExitCode { code: 2 }));

        let row = board.get(&job).unwrap();
        assert!(row.script.is_none());
        assert_eq!(row.status, JobStatus::Failed(Arc::from("exit code 2")));
    }

    #[test]
    fn test_stale_events_are_rejected() {
        let board = JobBoard::new();
        let job = JobId::generate();

        let early = Event::progress(job.clone(), Progress::Percent(10), "10%");
        let late = Event::aborted(job.clone());

        assert!(board.apply(&late));
        assert!(!board.apply(&early));
        assert_eq!(board.get(&job).unwrap().percent, None);
    }

    #[test]
    fn test_abort_request_marks_running_rows_only() {
        let board = JobBoard::new();
        let job = JobId::generate();

        board.apply(&Event::started(job.clone(), "x"));
        board.apply(&Event::abort_requested(job.clone()));
        assert_eq!(board.get(&job).unwrap().status, JobStatus::AbortRequested);

        board.apply(&Event::aborted(job.clone()));
        board.apply(&Event::abort_requested(job.clone()));
        assert_eq!(board.get(&job).unwrap().status, JobStatus::Aborted);
    }

    #[test]
    fn test_abort_request_minted_before_progress_still_applies() {
        let board = JobBoard::new();
        let job = JobId::generate();

        // Built first (lower seq), delivered after the output line.
        let request = Event::abort_requested(job.clone());
        let line = Event::progress(job.clone(), Progress::Percent(30), "30%");
        assert!(board.apply(&line));
        assert!(board.apply(&request));
        assert_eq!(board.get(&job).unwrap().status, JobStatus::AbortRequested);

        // It does not make later job events look stale.
        let next = Event::progress(job.clone(), Progress::Percent(35), "35%");
        assert!(board.apply(&next));
        assert_eq!(board.get(&job).unwrap().percent, Some(35));
    }

    #[test]
    fn test_snapshot_keeps_first_appearance_order() {
        let board = JobBoard::new();
        let a = JobId::generate();
        let b = JobId::generate();

        board.apply(&Event::started(a.clone(), "a"));
        board.apply(&Event::started(b.clone(), "b"));
        board.apply(&Event::finished(a.clone()));

        let ids: Vec<JobId> = board.snapshot().into_iter().map(|r| r.job).collect();
        assert_eq!(ids, vec![a, b]);
    }
}
