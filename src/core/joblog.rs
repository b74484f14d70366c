//! # Per-job log files.
//!
//! One UTF-8 file per job at `<log_dir>/<job_id>.log`, one line per captured
//! output line. The file is owned by its supervisor while the job runs.
//! Retention is optional: [`prune`] keeps the newest `keep` files and never
//! touches logs of jobs that are still registered.

use std::{
    io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use tokio::{
    fs::{self, File},
    io::{AsyncWriteExt, BufWriter},
};
use tracing::debug;

use crate::jobs::JobId;

/// Path of the log file for `job` inside `dir`.
pub fn log_path(dir: &Path, job: &JobId) -> PathBuf {
    dir.join(format!("{job}.log"))
}

/// Append-only writer for one job's log.
pub(crate) struct JobLog {
    out: BufWriter<File>,
}

impl JobLog {
    /// Creates (or truncates) the log file, creating the directory if needed.
    pub(crate) async fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = File::create(path).await?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Writes one line and flushes it so readers see output live.
    pub(crate) async fn append(&mut self, line: &str) -> io::Result<()> {
        self.out.write_all(line.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await
    }
}

/// Reads the whole log of `job`.
pub async fn read(dir: &Path, job: &JobId) -> io::Result<String> {
    fs::read_to_string(log_path(dir, job)).await
}

/// Deletes all but the newest `keep` `*.log` files in `dir`, skipping `active` jobs.
///
/// Logs of active jobs count toward `keep`; active jobs without a log yet (queued) do not.
/// Returns the number of files removed. A missing directory counts as empty.
pub async fn prune(dir: &Path, keep: usize, active: &[JobId]) -> io::Result<usize> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut logs: Vec<(SystemTime, PathBuf)> = Vec::new();
    let mut active_logs = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "log") {
            continue;
        }
        let is_active = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| active.iter().any(|id| id.as_str() == stem));
        if is_active {
            active_logs += 1;
            continue;
        }
        let modified = entry
            .metadata()
            .await
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        logs.push((modified, path));
    }

    let keep = keep.saturating_sub(active_logs);
    if logs.len() <= keep {
        return Ok(0);
    }

    // Newest first; everything past `keep` goes.
    logs.sort_unstable_by(|a, b| b.0.cmp(&a.0));
    let mut removed = 0;
    for (_, path) in logs.into_iter().skip(keep) {
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "pruned job log");
                removed += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_create_append_read() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("nested/logs");
        let job = JobId::generate();

        let mut log = JobLog::create(&log_path(&logs, &job)).await.unwrap();
        log.append("first").await.unwrap();
        log.append("second 50%").await.unwrap();
        assert!(log_path(&logs, &job).ends_with(format!("{job}.log")));

        assert_eq!(read(&logs, &job).await.unwrap(), "first\nsecond 50%\n");
    }

    #[tokio::test]
    async fn test_create_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let job = JobId::generate();
        let path = log_path(dir.path(), &job);
        std::fs::write(&path, "stale\n").unwrap();

        let mut log = JobLog::create(&path).await.unwrap();
        log.append("fresh").await.unwrap();
        assert_eq!(read(dir.path(), &job).await.unwrap(), "fresh\n");
    }

    #[tokio::test]
    async fn test_prune_keeps_newest_and_active() {
        let dir = tempfile::tempdir().unwrap();
        let ids: Vec<JobId> = (0..4).map(|_| JobId::generate()).collect();
        for id in &ids {
            std::fs::write(log_path(dir.path(), id), "x\n").unwrap();
            // Distinct modification times.
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        // ids[0] is the oldest but still active.
        let removed = prune(dir.path(), 2, &ids[..1]).await.unwrap();
        assert_eq!(removed, 2);

        assert!(log_path(dir.path(), &ids[0]).exists());
        assert!(!log_path(dir.path(), &ids[1]).exists());
        assert!(!log_path(dir.path(), &ids[2]).exists());
        assert!(log_path(dir.path(), &ids[3]).exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_prune_ignores_active_jobs_without_log() {
        let dir = tempfile::tempdir().unwrap();
        let older = JobId::generate();
        let newer = JobId::generate();
        std::fs::write(log_path(dir.path(), &older), "x\n").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        std::fs::write(log_path(dir.path(), &newer), "x\n").unwrap();

        // A queued job: registered, nothing on disk yet.
        let queued = JobId::generate();
        let removed = prune(dir.path(), 1, &[queued]).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!log_path(dir.path(), &older).exists());
        assert!(log_path(dir.path(), &newer).exists());
    }

    #[tokio::test]
    async fn test_prune_missing_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let removed = prune(&dir.path().join("absent"), 1, &[]).await.unwrap();
        assert_eq!(removed, 0);
    }
}
