//! # jobvisor
//!
//! **Jobvisor** runs external scripts as supervised child processes without blocking
//! the caller.
//!
//! Each submitted script becomes a job with a fresh [`JobId`]. The job's output is
//! captured line by line into `logs/<job_id>.log`, progress percentages are inferred
//! from the lines, and every lifecycle step is broadcast on an event [`Bus`]. Any
//! holder of a job id can request an abort, which escalates from a graceful
//! termination signal to a forced kill.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   submit("a.sh")          submit("b.sh")          request_abort(id)
//!        │                       │                         │
//!        ▼                       ▼                         │
//! ┌───────────────────────────────────────────────────┐     │
//! │  ExecutionPool                                    │     │
//! │  - JobRegistry (live jobs by id)                  │     │
//! │  - optional Semaphore (Config::max_concurrent)    │     │
//! │  - TaskTracker (one task per job)                 │     │
//! └──────┬──────────────────────────┬─────────────────┘     │
//!        ▼                          ▼                       │
//!   ┌───────────────┐        ┌───────────────┐              │
//!   │ JobSupervisor │        │ JobSupervisor │              │
//!   │  child + log  │        │  child + log  │              │
//!   └──────┬────────┘        └──────┬────────┘              │
//!          │ JobStarted, JobProgress, JobFinished,          │
//!          │ JobError, JobAborted                           │ AbortRequested
//!          ▼                        ▼                       ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │                    Bus (broadcast channel)                    │
//! │                  (capacity: Config::bus_capacity)             │
//! └──────┬───────────────────────────┬────────────────────────┬───┘
//!        ▼                           ▼                        ▼
//!  registry listener         subscriber listener      pool.subscribe()
//!  (AbortRequested →                 │
//!   sup.abort())               SubscriberSet
//!                          ┌─────────┼─────────┐
//!                          ▼         ▼         ▼
//!                       JobBoard  LogWriter  custom
//! ```
//!
//! ### Lifecycle
//! ```text
//! JobStarted(id, script)
//!   └─► JobProgress(0, "starting")
//!       └─► JobProgress(percent | -1, line)   (one per output line)
//!           ├─► JobFinished ─► JobProgress(100, "done in Ns")
//!           ├─► JobAborted  ─► JobProgress(100, "aborted after Ns")
//!           └─► JobError(message, exit code)
//! ```
//!
//! ## Features
//! | Area               | Description                                              | Key types / traits                          |
//! |--------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Execution**      | Submit scripts, abort them, wait for them.               | [`ExecutionPool`], [`PoolBuilder`]          |
//! | **Jobs**           | Describe what runs and how it reports progress.          | [`JobSpec`], [`Interpreter`], [`Progress`]  |
//! | **Subscriber API** | Hook into job lifecycle events (dashboards, audit).      | [`Subscribe`], [`JobBoard`]                 |
//! | **Errors**         | Typed errors for the engine and for contained failures.  | [`RuntimeError`], [`JobError`]              |
//! | **Configuration**  | Centralize runtime settings.                             | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use jobvisor::{Config, ExecutionPool, Interpreter, Subscribe};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config {
//!         interpreter: Some(Interpreter::new("python3").with_arg("-u")),
//!         max_concurrent: 4,
//!         ..Config::default()
//!     };
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(jobvisor::LogWriter::default())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!
//!     let pool = ExecutionPool::builder(cfg).with_subscribers(subs).build();
//!
//!     let id = pool.submit("scripts/import.py")?;
//!     pool.wait(&id).await;
//!     println!("{}", pool.read_log(&id).await?);
//!
//!     pool.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod jobs;
mod subscribers;

// ---- Public re-exports ----

pub use core::{AbortState, Config, ExecutionPool, JobRegistry, JobSupervisor, PoolBuilder};
pub use error::{JobError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use jobs::{Interpreter, JobId, JobSpec, Progress, extract_progress};
pub use subscribers::{JobBoard, JobStatus, JobView, Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
