//! # ExecutionPool: non-blocking job submission, abort routing and shutdown.
//!
//! The [`ExecutionPool`] owns the event bus, the [`JobRegistry`], a [`SubscriberSet`]
//! (always including the built-in [`JobBoard`]) and the job tasks. `submit` returns a
//! fresh [`JobId`] immediately; the job runs on its own Tokio task.
//!
//! ## Architecture
//! ```text
//! submit(script) ──► JobId::generate()
//!                    JobSupervisor::new(id, spec)
//!                    registry.register(sup)
//!                    bus.publish(JobStarted(id, script_name))
//!                    tracker.spawn(drive(sup))  ──► returns id
//!
//! drive(sup):
//!   [max_concurrent > 0] acquire permit  (abort/shutdown while queued → skip spawn)
//!   sup.start()  (panics contained → JobError)
//!   sup.finish() (deregister, wake waiters)
//!   [log_retention > 0] joblog::prune(log_dir, keep, registry.list())
//!
//! request_abort(id) ──► bus.publish(AbortRequested(id))
//!                        └─► registry listener ──► sup.abort()
//!
//! Bus ──► subscriber listener ──► SubscriberSet::emit(&Event) ──► [JobBoard, user subscribers...]
//!
//! shutdown():
//!   runtime_token.cancel()       → submit returns ShuttingDown, queued jobs abort
//!   registry.abort_all()
//!   wait tracker ≤ cfg.grace     → Ok | GraceExceeded { stuck: registry.list() }
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use jobvisor::{Config, EventKind, ExecutionPool, Interpreter};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config {
//!         interpreter: Some(Interpreter::new("/bin/sh")),
//!         ..Config::default()
//!     };
//!     let pool = ExecutionPool::new(cfg);
//!     let mut rx = pool.subscribe();
//!
//!     let id = pool.submit("scripts/report.sh")?;
//!     while let Ok(ev) = rx.recv().await {
//!         if ev.job == id && ev.kind == EventKind::JobProgress {
//!             println!("{:?} {:?}", ev.progress, ev.message);
//!         }
//!         if ev.job == id && ev.is_terminal() {
//!             break;
//!         }
//!     }
//!
//!     pool.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::{
    io,
    panic::AssertUnwindSafe,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::FutureExt;
use tokio::{
    sync::{
        Semaphore,
        broadcast::{self, error::RecvError},
    },
    time,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, warn};

use super::{
    builder::PoolBuilder,
    config::Config,
    joblog,
    registry::JobRegistry,
    supervisor::{JobSupervisor, SupervisorParams},
};
use crate::{
    error::{JobError, RuntimeError},
    events::{Bus, Event},
    jobs::{JobId, JobSpec},
    subscribers::{JobBoard, SubscriberSet, panic_message},
};

/// Runs scripts as supervised child processes without blocking the caller.
pub struct ExecutionPool {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    board: Arc<JobBoard>,
    registry: Arc<JobRegistry>,
    semaphore: Option<Arc<Semaphore>>,

    /// Cancelled by `shutdown`: no new submissions, queued jobs abort.
    runtime_token: CancellationToken,
    /// Cancelled on drop: stops the registry and subscriber listeners.
    listeners_token: CancellationToken,
    tracker: TaskTracker,
}

/// What a job task needs besides its supervisor.
struct DriveContext {
    registry: Arc<JobRegistry>,
    semaphore: Option<Arc<Semaphore>>,
    runtime_token: CancellationToken,
    log_dir: PathBuf,
    retention: Option<usize>,
}

impl ExecutionPool {
    /// Returns a builder for configuring subscribers.
    pub fn builder(cfg: Config) -> PoolBuilder {
        PoolBuilder::new(cfg)
    }

    /// Builds a pool with only the built-in [`JobBoard`] subscriber.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(cfg: Config) -> Arc<Self> {
        PoolBuilder::new(cfg).build()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        board: Arc<JobBoard>,
        registry: Arc<JobRegistry>,
        semaphore: Option<Arc<Semaphore>>,
        listeners_token: CancellationToken,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            board,
            registry,
            semaphore,
            runtime_token: CancellationToken::new(),
            listeners_token,
            tracker,
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    pub(crate) fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        let token = self.listeners_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "subscriber listener lagged; events dropped");
                        }
                    }
                }
            }
        });
    }

    /// Runs `script` with the configured default interpreter.
    ///
    /// Returns the job id immediately; progress is observed on the bus.
    pub fn submit(&self, script: impl Into<PathBuf>) -> Result<JobId, RuntimeError> {
        self.submit_spec(JobSpec::with_defaults(script, &self.cfg))
    }

    /// Runs a fully specified job.
    ///
    /// Publishes `JobStarted` before returning. Fails only if the pool is shutting down.
    pub fn submit_spec(&self, spec: JobSpec) -> Result<JobId, RuntimeError> {
        if self.runtime_token.is_cancelled() {
            return Err(RuntimeError::ShuttingDown);
        }

        let params = SupervisorParams {
            bus: self.bus.clone(),
            registry: Arc::downgrade(&self.registry),
            log_dir: self.cfg.log_dir.clone(),
            kill_grace: self.cfg.kill_grace,
        };
        let sup = loop {
            let sup = Arc::new(JobSupervisor::new(
                JobId::generate(),
                spec.clone(),
                params.clone(),
            ));
            if self.registry.register(Arc::clone(&sup)) {
                break sup;
            }
        };

        let id = sup.id().clone();
        debug!(job = %id, script = %spec.script().display(), "job submitted");
        self.bus
            .publish(Event::started(id.clone(), sup.script_name()));

        let ctx = DriveContext {
            registry: Arc::clone(&self.registry),
            semaphore: self.semaphore.clone(),
            runtime_token: self.runtime_token.clone(),
            log_dir: self.cfg.log_dir.clone(),
            retention: self.cfg.retention_limit(),
        };
        self.tracker.spawn(drive(sup, ctx));
        Ok(id)
    }

    /// Asks the job to stop.
    ///
    /// Collapses to an `AbortRequested` bus event; unknown or finished ids are ignored.
    pub fn request_abort(&self, id: &JobId) {
        self.bus.publish(Event::abort_requested(id.clone()));
    }

    /// New receiver for all job events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Dashboard view maintained from the event stream.
    pub fn board(&self) -> &Arc<JobBoard> {
        &self.board
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// `<log_dir>/<id>.log`
    pub fn log_path(&self, id: &JobId) -> PathBuf {
        joblog::log_path(&self.cfg.log_dir, id)
    }

    /// Reads the job's log as written so far.
    pub async fn read_log(&self, id: &JobId) -> io::Result<String> {
        joblog::read(&self.cfg.log_dir, id).await
    }

    /// Resolves once the job is done. Returns immediately for ids that are not registered.
    pub async fn wait(&self, id: &JobId) {
        if let Some(sup) = self.registry.get(id) {
            sup.wait().await;
        }
    }

    /// Stops accepting jobs, aborts every live job and waits up to [`Config::grace`].
    ///
    /// Returns [`RuntimeError::GraceExceeded`] with the ids still registered on timeout.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.runtime_token.cancel();
        self.registry.abort_all();
        self.tracker.close();

        let grace = self.cfg.grace;
        match time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let stuck = self.registry.list();
                warn!(?grace, stuck = stuck.len(), "jobs still running after grace");
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        self.runtime_token.is_cancelled()
    }
}

impl Drop for ExecutionPool {
    fn drop(&mut self) {
        self.runtime_token.cancel();
        self.listeners_token.cancel();
    }
}

/// Body of one job task.
async fn drive(sup: Arc<JobSupervisor>, ctx: DriveContext) {
    let _permit = match &ctx.semaphore {
        Some(sem) => tokio::select! {
            permit = Arc::clone(sem).acquire_owned() => permit.ok(),
            _ = sup.abort_requested() => None,
            _ = ctx.runtime_token.cancelled() => {
                sup.abort();
                None
            }
        },
        None => None,
    };

    if let Err(payload) = AssertUnwindSafe(sup.start()).catch_unwind().await {
        let info = panic_message(payload.as_ref());
        warn!(job = %sup.id(), %info, "job supervisor panicked");
        sup.fail(&JobError::Panicked { info });
    }
    sup.finish();

    if let Some(keep) = ctx.retention {
        prune_logs(&ctx.log_dir, keep, &ctx.registry).await;
    }
}

async fn prune_logs(dir: &Path, keep: usize, registry: &JobRegistry) {
    match joblog::prune(dir, keep, &registry.list()).await {
        Ok(0) => {}
        Ok(removed) => debug!(removed, "old job logs pruned"),
        Err(e) => warn!(error = %e, dir = %dir.display(), "log pruning failed"),
    }
}
