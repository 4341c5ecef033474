//! CRAB job-submission client.
//!
//! Queries the status of one task directory through the `crab` command line
//! client. The client is expected to print the task status as a JSON object
//! with `dbStatus`, `dagStatus` and `jobList` keys; log lines printed before
//! the object are ignored.
//!
//! These keys are the ones the CRAB Python API returns from
//! `crabCommand('status', dir=...)`. That `crab status --json` prints the same
//! object is assumed, not verified against a real client. A client that
//! prints something else shows up as [`JobServiceError::InvalidOutput`],
//! which aborts the run; swap `crab_bin` for a wrapper around the Python API
//! in that case.

use crabwatch_core::StatusReport;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// File CRAB writes into a task directory once the submission request exists.
pub const REQUEST_CACHE: &str = ".requestcache";

/// Marker of the client's "no request cache" failure.
const CACHEFILE_NOT_FOUND: &str = "CachefileNotFound";

#[derive(Debug, Error)]
pub enum JobServiceError {
    #[error("task directory {0} was not properly created")]
    NotInitialized(String),
    #[error("failed to execute crab: {0}")]
    Execution(#[from] std::io::Error),
    #[error("crab status failed for {task_dir}: {message}")]
    CommandFailed { task_dir: String, message: String },
    #[error("unparseable crab status output for {task_dir}: {source}")]
    InvalidOutput {
        task_dir: String,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, JobServiceError>;

/// Source of live task status.
pub trait JobService {
    /// Current status of the task stored in `task_dir`.
    ///
    /// Fails with [`JobServiceError::NotInitialized`] when the directory was
    /// never turned into a proper CRAB task.
    fn status(&self, task_dir: &Path) -> impl Future<Output = Result<StatusReport>> + Send;
}

/// [`JobService`] backed by the `crab` executable.
#[derive(Debug, Clone)]
pub struct CrabClient {
    crab_bin: PathBuf,
}

impl CrabClient {
    pub fn new(crab_bin: impl Into<PathBuf>) -> Self {
        Self {
            crab_bin: crab_bin.into(),
        }
    }
}

impl JobService for CrabClient {
    async fn status(&self, task_dir: &Path) -> Result<StatusReport> {
        let task_label = task_dir.display().to_string();
        if !task_dir.join(REQUEST_CACHE).is_file() {
            return Err(JobServiceError::NotInitialized(task_label));
        }

        debug!(task_dir = %task_label, crab = %self.crab_bin.display(), "querying crab status");
        let output = Command::new(&self.crab_bin)
            .args(["status", "--json", "--dir"])
            .arg(task_dir)
            .stdin(Stdio::null())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stdout.contains(CACHEFILE_NOT_FOUND) || stderr.contains(CACHEFILE_NOT_FOUND) {
            return Err(JobServiceError::NotInitialized(task_label));
        }
        if !output.status.success() {
            return Err(JobServiceError::CommandFailed {
                task_dir: task_label,
                message: stderr.trim().to_string(),
            });
        }

        parse_status_output(&stdout).map_err(|source| JobServiceError::InvalidOutput {
            task_dir: task_label,
            source,
        })
    }
}

/// Parse the status object out of the client's stdout.
///
/// Uses the last line that opens a JSON object, falling back to the whole
/// output for pretty-printed JSON.
pub fn parse_status_output(stdout: &str) -> serde_json::Result<StatusReport> {
    let last_object = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with('{') && line.ends_with('}'));
    match last_object {
        Some(line) => serde_json::from_str(line),
        None => serde_json::from_str(stdout.trim()),
    }
}
