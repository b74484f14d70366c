//! # Run one child process to its exit.
//!
//! Executes the process side of a job: spawn, line-oriented capture into the log
//! and onto the [`Bus`], then wait or terminate.
//!
//! ## Flow
//! ```text
//! spawn(spec.command()) ──Err──► JobError::Spawn
//!   │
//!   ├─► JobLog::create ──Err──► JobError::Log        (child killed on drop)
//!   │
//!   ├─► loop (stdout + stderr merged by arrival):
//!   │     ├─ abort token cancelled ─► stop reading (no drain)
//!   │     └─ line ─► log.append ─► publish JobProgress(extract_progress(line), line)
//!   │
//!   └─► exit:
//!         ├─ abort requested ─► terminate()
//!         │     ├─ Exit::Natural ─► drain remaining lines (log + bus)
//!         │     └─ Exit::Aborted ─► unread output is discarded
//!         └─ otherwise       ─► select { child.wait(), abort → terminate() }
//!
//! terminate():
//!   try_wait() = exited ─► Exit::Natural   (exit observed before any signal)
//!   SIGTERM (group) ─► wait ≤ kill_grace ─► SIGKILL (group) + reap ─► Exit::Aborted
//!
//! drain():
//!   read until EOF; if the pipes are still open after kill_grace (background
//!   processes of the exited child), SIGKILL the group and keep reading
//! ```
//!
//! ## Rules
//! - The child handle lives only in this function; the published pid is cleared on every exit path.
//! - A job reported as finished or failed has every line its child printed in the log.
//! - Suspension points: next output line, child exit, and the kill grace sleep.

use std::{
    io,
    path::Path,
    process::ExitStatus,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use futures::{Stream, StreamExt, stream};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Child,
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    core::joblog::JobLog,
    error::JobError,
    events::{Bus, Event},
    jobs::{JobId, JobSpec, extract_progress},
};

/// How the child ended.
#[derive(Debug)]
pub(crate) enum Exit {
    /// Exited on its own (or before any termination signal reached it).
    Natural(ExitStatus),
    /// Terminated by the engine after an abort request.
    Aborted,
}

/// Everything one attempt needs, borrowed from its supervisor.
pub(crate) struct Attempt<'a> {
    pub job: &'a JobId,
    pub spec: &'a JobSpec,
    pub log_path: &'a Path,
    pub bus: &'a Bus,
    pub abort: &'a CancellationToken,
    pub kill_grace: Duration,
    pub pid: &'a Mutex<Option<u32>>,
}

impl Attempt<'_> {
    /// Spawns the child and drives it to an [`Exit`].
    pub(crate) async fn run(&self) -> Result<Exit, JobError> {
        let mut child = self
            .spec
            .command()
            .spawn()
            .map_err(|source| JobError::Spawn {
                program: self.spec.program().display().to_string(),
                source,
            })?;
        self.set_pid(child.id());
        debug!(job = %self.job, pid = ?child.id(), "child spawned");

        let res = self.supervise(&mut child).await;
        self.set_pid(None);
        res
    }

    async fn supervise(&self, child: &mut Child) -> Result<Exit, JobError> {
        let mut log = JobLog::create(self.log_path)
            .await
            .map_err(|source| JobError::Log {
                path: self.log_path.to_path_buf(),
                source,
            })?;

        let pgid = child.id();
        let stdout = child.stdout.take().map(line_stream);
        let stderr = child.stderr.take().map(line_stream);
        let mut lines = Box::pin(stream::select(
            stream::iter(stdout).flatten(),
            stream::iter(stderr).flatten(),
        ));

        loop {
            tokio::select! {
                biased;
                _ = self.abort.cancelled() => break,
                next = lines.next() => match next {
                    Some(line) => self.capture(line, &mut log).await?,
                    None => break,
                },
            }
        }

        if self.abort.is_cancelled() {
            return match self.terminate(child).await? {
                Exit::Natural(status) => {
                    debug!(job = %self.job, "abort lost to natural exit; draining output");
                    self.drain(&mut lines, &mut log, pgid).await?;
                    Ok(Exit::Natural(status))
                }
                Exit::Aborted => Ok(Exit::Aborted),
            };
        }

        tokio::select! {
            biased;
            status = child.wait() => {
                status.map(Exit::Natural).map_err(|source| JobError::Capture { source })
            }
            _ = self.abort.cancelled() => self.terminate(child).await,
        }
    }

    /// Appends one captured line to the log and publishes it as progress.
    async fn capture(&self, line: io::Result<String>, log: &mut JobLog) -> Result<(), JobError> {
        let line = line.map_err(|source| JobError::Capture { source })?;
        log.append(&line).await.map_err(|source| JobError::Log {
            path: self.log_path.to_path_buf(),
            source,
        })?;
        let progress = extract_progress(&line);
        self.bus.publish(Event::progress(self.job.clone(), progress, line));
        Ok(())
    }

    /// Reads the rest of the output of an exited child.
    ///
    /// Stragglers still holding the pipes after `kill_grace` are killed so EOF arrives.
    async fn drain<S>(&self, lines: &mut S, log: &mut JobLog, pgid: Option<u32>) -> Result<(), JobError>
    where
        S: Stream<Item = io::Result<String>> + Unpin,
    {
        let deadline = time::sleep(self.kill_grace);
        tokio::pin!(deadline);
        let mut stragglers_killed = false;

        loop {
            tokio::select! {
                next = lines.next() => match next {
                    Some(line) => self.capture(line, log).await?,
                    None => return Ok(()),
                },
                _ = &mut deadline, if !stragglers_killed => {
                    debug!(job = %self.job, "output still open after exit; killing process group");
                    kill_stragglers(pgid);
                    stragglers_killed = true;
                }
            }
        }
    }

    /// Graceful termination, then forced kill after `kill_grace`.
    async fn terminate(&self, child: &mut Child) -> Result<Exit, JobError> {
        let capture = |source| JobError::Capture { source };

        if let Some(status) = child.try_wait().map_err(capture)? {
            debug!(job = %self.job, "exit observed before termination signal");
            return Ok(Exit::Natural(status));
        }

        signal_terminate(child);
        match time::timeout(self.kill_grace, child.wait()).await {
            Ok(status) => {
                status.map_err(capture)?;
            }
            Err(_elapsed) => {
                debug!(job = %self.job, grace = ?self.kill_grace, "still alive after grace; killing");
                signal_kill(child);
                child.wait().await.map_err(capture)?;
            }
        }
        Ok(Exit::Aborted)
    }

    fn set_pid(&self, pid: Option<u32>) {
        *self.pid.lock().unwrap_or_else(PoisonError::into_inner) = pid;
    }
}

/// Line stream over one pipe; invalid UTF-8 is replaced, trailing `\n`/`\r\n` stripped.
fn line_stream<R>(reader: R) -> impl Stream<Item = io::Result<String>>
where
    R: AsyncRead + Unpin,
{
    stream::unfold(Some(BufReader::new(reader)), |state| async move {
        let mut reader = state?;
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => None,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                Some((Ok(String::from_utf8_lossy(&buf).into_owned()), Some(reader)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

#[cfg(unix)]
fn signal_group(pgid: u32, signal: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let _ = killpg(Pid::from_raw(pgid as i32), signal);
}

/// Sends SIGTERM to the child's process group.
#[cfg(unix)]
fn signal_terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        signal_group(pid, nix::sys::signal::Signal::SIGTERM);
    }
}

/// No graceful signal off unix: go straight to kill.
#[cfg(not(unix))]
fn signal_terminate(child: &mut Child) {
    let _ = child.start_kill();
}

/// Sends SIGKILL to the child's process group and the child itself.
#[cfg(unix)]
fn signal_kill(child: &mut Child) {
    if let Some(pid) = child.id() {
        signal_group(pid, nix::sys::signal::Signal::SIGKILL);
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn signal_kill(child: &mut Child) {
    let _ = child.start_kill();
}

/// Kills what is left of an already reaped child's process group.
#[cfg(unix)]
fn kill_stragglers(pgid: Option<u32>) {
    if let Some(pgid) = pgid {
        signal_group(pgid, nix::sys::signal::Signal::SIGKILL);
    }
}

/// Without process groups there is nothing to reach; keep reading.
#[cfg(not(unix))]
fn kill_stragglers(_pgid: Option<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_line_stream_strips_newlines_and_keeps_last_partial_line() {
        let input: &[u8] = b"one\r\ntwo\n\nlast";
        let lines: Vec<String> = line_stream(input)
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines, ["one", "two", "", "last"]);
    }

    #[tokio::test]
    async fn test_line_stream_replaces_invalid_utf8() {
        let input: &[u8] = b"ok \xff bytes\n";
        let lines: Vec<String> = line_stream(input)
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines, ["ok \u{fffd} bytes"]);
    }
}
