//! # Job value types.
//!
//! - [`JobId`] - opaque, filesystem-safe job identifier
//! - [`JobSpec`] / [`Interpreter`] - what to launch for a job
//! - [`Progress`] / [`extract_progress`] - progress inferred from output lines

mod id;
mod progress;
mod spec;

pub use id::JobId;
pub use progress::{Progress, extract_progress};
pub use spec::{Interpreter, JobSpec};
