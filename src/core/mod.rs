//! Runtime core: job execution and lifecycle.
//!
//! The public API from this module is [`ExecutionPool`] (built with [`PoolBuilder`]),
//! the [`JobRegistry`] it shares with abort issuers, the per-job [`JobSupervisor`],
//! and the global [`Config`].
//!
//! Internal modules:
//! - [`pool`]: submission, job tasks, concurrency limit, shutdown;
//! - [`supervisor`]: one job's lifecycle and terminal events;
//! - [`runner`]: spawns the child, captures output, terminates on abort;
//! - [`registry`]: live jobs by id, routes abort requests;
//! - [`joblog`]: per-job log files and retention.

mod builder;
mod config;
mod joblog;
mod pool;
mod registry;
mod runner;
mod supervisor;

pub use builder::PoolBuilder;
pub use config::Config;
pub use pool::ExecutionPool;
pub use registry::JobRegistry;
pub use supervisor::{AbortState, JobSupervisor};
