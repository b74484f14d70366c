//! # LogWriter: event printer
//!
//! A minimal subscriber that renders incoming [`Event`]s through `tracing`.
//! Use it for tests or demos; install a `tracing` subscriber to see the output.
//!
//! ## Example output
//! ```text
//! INFO [started] job=3f9c0a1be2d45f70 script="backup.py"
//! INFO [progress] job=3f9c0a1be2d45f70 percent=42 msg="Step 3 42%"
//! INFO [abort-requested] job=3f9c0a1be2d45f70
//! INFO [aborted] job=3f9c0a1be2d45f70
//! WARN [error] job=9a01c7d2e3f4a5b6 err="exit code 2"
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let msg = e.message.as_deref().unwrap_or("");
        match e.kind {
            EventKind::JobStarted => {
                info!(job = %e.job, script = ?e.script.as_deref(), "[started]");
            }
            EventKind::JobProgress => {
                let percent = e.progress.map_or(-1, |p| p.as_raw());
                info!(job = %e.job, percent, msg, "[progress]");
            }
            EventKind::JobFinished => info!(job = %e.job, "[finished]"),
            EventKind::AbortRequested => info!(job = %e.job, "[abort-requested]"),
            EventKind::JobAborted => info!(job = %e.job, "[aborted]"),
            EventKind::JobError => {
                warn!(job = %e.job, err = msg, exit_code = ?e.exit_code, "[error]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
