//! # JobSupervisor: owns one child-process lifecycle.
//!
//! Runs one [`JobSpec`] to completion or cancellation, producing a durable log
//! and a live event stream on the [`Bus`].
//!
//! ## Event flow
//! ```text
//! (pool) JobStarted
//! start():
//!   publish JobProgress(0, "starting")
//!   abort already requested? ─► Aborted (nothing spawned)
//!   Attempt::run() ─► per line: JobProgress(percent | -1, line)
//!        │
//!        ├─ Exit::Aborted            ─► JobAborted  → JobProgress(100, "aborted after Ns")
//!        ├─ Exit::Natural(success)   ─► JobFinished → JobProgress(100, "done in Ns")
//!        ├─ Exit::Natural(failure)   ─► JobError("exit code N")
//!        └─ Err(JobError)            ─► JobError(message)
//! ```
//!
//! ## Rules
//! - `start()` runs at most once; later calls return immediately.
//! - `abort()` may be called from anywhere, any number of times; only the first call
//!   while running has an effect.
//! - The job is removed from the [`JobRegistry`] right before its terminal event is published.

use std::{
    path::{Path, PathBuf},
    sync::{
        Mutex, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    time::{Duration, Instant},
};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    core::{
        registry::JobRegistry,
        runner::{Attempt, Exit},
    },
    error::JobError,
    events::{Bus, Event},
    jobs::{JobId, JobSpec, Progress},
};

const RUNNING: u8 = 0;
const ABORT_REQUESTED: u8 = 1;
const ABORTED: u8 = 2;

/// Abort flag of a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortState {
    /// No abort requested.
    Running,
    /// Abort requested but not carried out: still pending, or the child exited
    /// on its own before the termination signal was sent.
    AbortRequested,
    /// The child was terminated on request.
    Aborted,
}

/// Parameters shared by every supervisor of a pool.
#[derive(Clone)]
pub(crate) struct SupervisorParams {
    pub bus: Bus,
    pub registry: Weak<JobRegistry>,
    pub log_dir: PathBuf,
    pub kill_grace: Duration,
}

/// Supervises one execution attempt of one script.
pub struct JobSupervisor {
    id: JobId,
    spec: JobSpec,
    script_name: String,
    log_path: PathBuf,
    kill_grace: Duration,
    bus: Bus,
    registry: Weak<JobRegistry>,

    state: AtomicU8,
    started: AtomicBool,
    abort: CancellationToken,
    done: CancellationToken,
    pid: Mutex<Option<u32>>,
}

impl JobSupervisor {
    pub(crate) fn new(id: JobId, spec: JobSpec, params: SupervisorParams) -> Self {
        let log_path = crate::core::joblog::log_path(&params.log_dir, &id);
        let script_name = spec.script_name();
        Self {
            id,
            spec,
            script_name,
            log_path,
            kill_grace: params.kill_grace,
            bus: params.bus,
            registry: params.registry,
            state: AtomicU8::new(RUNNING),
            started: AtomicBool::new(false),
            abort: CancellationToken::new(),
            done: CancellationToken::new(),
            pid: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    /// File name of the script.
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    /// `<log_dir>/<job_id>.log`
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Abort flag; `Aborted` only when the child was actually terminated.
    pub fn abort_state(&self) -> AbortState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => AbortState::Running,
            ABORT_REQUESTED => AbortState::AbortRequested,
            _ => AbortState::Aborted,
        }
    }

    /// Pid of the child while it runs.
    pub fn pid(&self) -> Option<u32> {
        *self.pid.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True once the job reached a terminal state and left the registry.
    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Requests cancellation.
    ///
    /// Non-blocking and idempotent. The supervisor stops reading output, sends a
    /// graceful termination signal, waits `kill_grace`, then kills the child.
    /// Has no effect once the job is done.
    pub fn abort(&self) {
        if self.is_done() {
            return;
        }
        if self
            .state
            .compare_exchange(RUNNING, ABORT_REQUESTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!(job = %self.id, "abort requested");
            self.abort.cancel();
        }
    }

    /// Resolves when the job is done (terminal events published, registry entry removed).
    pub async fn wait(&self) {
        self.done.cancelled().await
    }

    /// Resolves when an abort has been requested.
    pub(crate) async fn abort_requested(&self) {
        self.abort.cancelled().await
    }

    /// Runs the job. Called once by the pool; never panics on job failures.
    pub(crate) async fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!(job = %self.id, "start called twice; ignored");
            return;
        }

        let began = Instant::now();
        self.bus
            .publish(Event::progress(self.id.clone(), Progress::Percent(0), "starting"));

        let outcome = if self.abort.is_cancelled() {
            Ok(Exit::Aborted)
        } else {
            Attempt {
                job: &self.id,
                spec: &self.spec,
                log_path: &self.log_path,
                bus: &self.bus,
                abort: &self.abort,
                kill_grace: self.kill_grace,
                pid: &self.pid,
            }
            .run()
            .await
        };
        let secs = began.elapsed().as_secs_f64();

        match outcome {
            Ok(Exit::Aborted) => {
                self.state.store(ABORTED, Ordering::Release);
                self.deregister();
                self.bus.publish(Event::aborted(self.id.clone()));
                self.bus.publish(Event::progress(
                    self.id.clone(),
                    Progress::DONE,
                    format!("aborted after {secs:.1}s"),
                ));
            }
            Ok(Exit::Natural(status)) if status.success() => {
                self.deregister();
                self.bus.publish(Event::finished(self.id.clone()));
                self.bus.publish(Event::progress(
                    self.id.clone(),
                    Progress::DONE,
                    format!("done in {secs:.1}s"),
                ));
            }
            Ok(Exit::Natural(status)) => self.fail(&exit_error(status)),
            Err(err) => self.fail(&err),
        }
    }

    /// Publishes a contained failure as `JobError`.
    pub(crate) fn fail(&self, err: &JobError) {
        debug!(job = %self.id, label = err.as_label(), error = %err, "job failed");
        self.deregister();
        self.bus.publish(Event::error(self.id.clone(), err));
    }

    /// Removes the registry entry and marks the job done. Safe to call repeatedly.
    pub(crate) fn finish(&self) {
        self.deregister();
        self.done.cancel();
    }

    fn deregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(&self.id);
        }
    }
}

impl std::fmt::Debug for JobSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSupervisor")
            .field("id", &self.id)
            .field("script", &self.script_name)
            .field("state", &self.abort_state())
            .field("done", &self.is_done())
            .finish()
    }
}

/// Maps an unsuccessful exit status to a [`JobError`].
fn exit_error(status: std::process::ExitStatus) -> JobError {
    if let Some(code) = status.code() {
        return JobError::ExitCode { code };
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return JobError::Signaled { signal };
        }
    }
    JobError::ExitCode { code: -1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    fn supervisor(bus: &Bus, spec: JobSpec) -> JobSupervisor {
        JobSupervisor::new(
            JobId::generate(),
            spec,
            SupervisorParams {
                bus: bus.clone(),
                registry: Weak::new(),
                log_dir: PathBuf::from("logs"),
                kill_grace: Duration::from_millis(50),
            },
        )
    }

    #[test]
    fn test_abort_is_idempotent() {
        let bus = Bus::new(16);
        let sup = supervisor(&bus, JobSpec::new("noop.sh"));
        assert_eq!(sup.abort_state(), AbortState::Running);

        sup.abort();
        sup.abort();
        assert_eq!(sup.abort_state(), AbortState::AbortRequested);
    }

    #[test]
    fn test_abort_after_done_is_noop() {
        let bus = Bus::new(16);
        let sup = supervisor(&bus, JobSpec::new("noop.sh"));
        sup.finish();
        sup.abort();
        assert_eq!(sup.abort_state(), AbortState::Running);
        assert!(sup.is_done());
    }

    #[test]
    fn test_log_path_derives_from_id() {
        let bus = Bus::new(16);
        let sup = supervisor(&bus, JobSpec::new("dir/report.py"));
        assert_eq!(sup.log_path(), Path::new("logs").join(format!("{}.log", sup.id())));
        assert_eq!(sup.script_name(), "report.py");
        assert_eq!(sup.pid(), None);
    }

    #[tokio::test]
    async fn test_abort_before_start_skips_spawn() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        // Nonexistent program: spawning it would produce JobError instead.
        let sup = supervisor(&bus, JobSpec::new("/nonexistent/never-spawned"));

        sup.abort();
        sup.start().await;

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            [EventKind::JobProgress, EventKind::JobAborted, EventKind::JobProgress]
        );
        assert_eq!(sup.abort_state(), AbortState::Aborted);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported_as_error() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let sup = supervisor(&bus, JobSpec::new("/nonexistent/missing-script"));

        sup.start().await;

        let events: Vec<Event> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let last = events.last().unwrap();
        assert_eq!(last.kind, EventKind::JobError);
        assert!(last.message.as_deref().unwrap().starts_with("failed to spawn"));
        assert_eq!(last.exit_code, None);
        assert!(!events.iter().any(|e| e.kind == EventKind::JobFinished));
    }

    #[tokio::test]
    async fn test_start_runs_once() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let sup = supervisor(&bus, JobSpec::new("/nonexistent/missing-script"));

        sup.start().await;
        sup.start().await;

        let errors = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| e.kind == EventKind::JobError)
            .count();
        assert_eq!(errors, 1);
    }
}
