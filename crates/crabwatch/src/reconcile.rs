//! One reconciliation pass over the monitored tasks.
//!
//! Prior completions are first checked against the sample database; every
//! task that is neither recorded nor (unless re-checking) completed is then
//! polled and classified. The result is a fresh snapshot holding each current
//! task exactly once.

use crabwatch_core::naming::record_key;
use crabwatch_core::{classify, SessionIdentity, Snapshot, StatusCategory};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crab::{JobService, JobServiceError};
use crate::records::{RecordStore, RecordStoreError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("record store lookup failed: {0}")]
    Records(#[from] RecordStoreError),
    #[error("job status query failed: {0}")]
    Jobs(#[from] JobServiceError),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Move completed tasks whose output is catalogued to RECORDED.
///
/// Returns the number of newly recorded tasks. Recorded tasks are never
/// looked up again.
pub async fn reconcile_prior_completions<R: RecordStore>(
    prior: &mut Snapshot,
    records: &R,
    identity: &SessionIdentity,
    task_prefix: &str,
) -> Result<usize> {
    let completed = prior.tasks(StatusCategory::Completed).to_vec();
    let mut recorded = 0;
    for task in completed {
        let key = record_key(&task, task_prefix, identity);
        let ids = records.find(&key).await?;
        if ids.is_empty() {
            debug!(task = %task, key = %key, "not yet in sample database");
            continue;
        }
        info!(task = %task, key = %key, ids = ?ids, "task output recorded");
        prior.insert(StatusCategory::Recorded, task);
        recorded += 1;
    }
    Ok(recorded)
}

/// Options for [`poll_tasks`].
#[derive(Debug, Clone, Copy)]
pub struct PollOptions<'a> {
    pub tasks_dir: &'a Path,
    /// Poll tasks the prior snapshot marks COMPLETED.
    pub recheck_completed: bool,
}

/// Build the snapshot for this run.
///
/// Tasks recorded in `prior` are carried over as-is, as are completed ones
/// unless re-checking. Everything else is polled. Prior entries for tasks
/// not in `tasks` are dropped.
pub async fn poll_tasks<J: JobService>(
    tasks: &[String],
    prior: &Snapshot,
    jobs: &J,
    options: PollOptions<'_>,
) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    for task in tasks {
        match prior.category_of(task) {
            Some(StatusCategory::Recorded) => {
                snapshot.insert(StatusCategory::Recorded, task.as_str());
                continue;
            }
            Some(StatusCategory::Completed) if !options.recheck_completed => {
                snapshot.insert(StatusCategory::Completed, task.as_str());
                continue;
            }
            _ => {}
        }

        info!("##### Checking task {task} #####");
        let task_dir = options.tasks_dir.join(task);
        let category = match jobs.status(&task_dir).await {
            Ok(report) => classify(&report),
            Err(JobServiceError::NotInitialized(dir)) => {
                warn!(task = %task, task_dir = %dir, "task directory not initialized");
                StatusCategory::SubmitFailed
            }
            Err(err) => return Err(err.into()),
        };
        info!(task = %task, status = %category, "task classified");
        snapshot.insert(category, task.as_str());
    }
    Ok(snapshot)
}
