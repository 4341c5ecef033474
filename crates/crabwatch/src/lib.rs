//! crabwatch - CRAB production monitor
//!
//! Polls every CRAB task of a production, keeps a per-session snapshot of
//! task statuses, and suggests the commands needed to move failed or
//! finished tasks forward.

pub mod crab;
pub mod git;
pub mod reconcile;
pub mod records;
pub mod render;
pub mod session;
pub mod tasks;

use std::path::PathBuf;

use crabwatch_core::snapshot::SnapshotError;
use crabwatch_core::{Config, Remediation, Snapshot};
use crab::CrabClient;
use reconcile::{poll_tasks, reconcile_prior_completions, PollOptions, ReconcileError};
use records::{RecordStoreError, SqlRecordStore};
use session::{resolve_session, FsSessionSource, SessionError, SessionRequest};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("no task to monitor in {0}")]
    NoTasks(String),
    #[error("failed to list tasks in {path}: {source}")]
    Tasks {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to read blacklist {path}: {source}")]
    Blacklist {
        path: String,
        source: std::io::Error,
    },
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("sample database error: {0}")]
    Records(#[from] RecordStoreError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

pub type Result<T> = std::result::Result<T, MonitorError>;

/// Per-invocation options that are not part of [`Config`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Directory relative config paths and `<task>.py` files resolve against.
    pub workspace: PathBuf,
    /// Start a new session from the current checkouts.
    pub new_session: bool,
    /// Snapshot file to continue from instead of the newest one.
    pub snapshot: Option<PathBuf>,
}

/// Run one monitoring pass and print the report.
///
/// Returns the snapshot that was written.
pub async fn run_monitor(config: &Config, options: &RunOptions) -> Result<Snapshot> {
    let workspace = &options.workspace;
    let tasks_dir = workspace.join(&config.tasks_dir);

    let tasks = tasks::list_tasks(&tasks_dir).map_err(|source| MonitorError::Tasks {
        path: tasks_dir.display().to_string(),
        source,
    })?;
    if tasks.is_empty() {
        return Err(MonitorError::NoTasks(tasks_dir.display().to_string()));
    }
    info!(count = tasks.len(), tasks_dir = %tasks_dir.display(), "found tasks");

    let source = FsSessionSource::new(workspace, config.analysis_config.clone());
    let request = SessionRequest {
        new_session: options.new_session,
        snapshot_override: options.snapshot.as_ref().map(|path| workspace.join(path)),
        framework_dir: config.framework_dir.clone(),
        snapshot_dir: workspace.join(&config.snapshot_dir),
    };
    let session = resolve_session(&source, &tasks, &request)?;

    let mut prior = match Snapshot::load(&session.snapshot_path)? {
        Some(snapshot) => {
            debug!(snapshot = %session.snapshot_path.display(), tasks = snapshot.len(), "loaded prior snapshot");
            snapshot
        }
        None => Snapshot::new(),
    };

    // Without a store nothing is ever found, so completed tasks stay completed.
    let store = match config.record_store_url.as_deref() {
        None => {
            warn!("no sample database configured, skipping record lookup");
            None
        }
        Some(_) if session.identity.is_empty() => {
            warn!("session identity unknown, skipping record lookup");
            None
        }
        Some(url) => Some(SqlRecordStore::connect(url).await?),
    };
    let recorded =
        reconcile_prior_completions(&mut prior, &store, &session.identity, &config.task_prefix)
            .await?;
    if store.is_some() {
        info!(recorded, "checked completed tasks against sample database");
    }

    let jobs = CrabClient::new(&config.crab_bin);
    let snapshot = poll_tasks(
        &tasks,
        &prior,
        &jobs,
        PollOptions {
            tasks_dir: &tasks_dir,
            recheck_completed: config.recheck_completed,
        },
    )
    .await?;

    snapshot.save(&session.snapshot_path)?;
    info!(snapshot = %session.snapshot_path.display(), "snapshot saved");

    let blacklist_path = workspace.join(&config.blacklist_file);
    let blacklist =
        render::read_blacklist(&blacklist_path).map_err(|source| MonitorError::Blacklist {
            path: blacklist_path.display().to_string(),
            source,
        })?;
    let remediation = Remediation::new(config.tasks_dir.clone())
        .with_post_crab_cmd(config.post_crab_cmd.clone())
        .with_blacklist(blacklist);
    render::print_report(&snapshot, tasks.len(), &remediation);

    Ok(snapshot)
}
