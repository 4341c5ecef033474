//! Task status classification.
//!
//! Maps the CRAB client's status report for one task onto a single
//! [`StatusCategory`]. Pure: no I/O, so every decision is unit-testable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::StatusCategory;

/// Service-level status meaning the task was handed to the grid scheduler.
pub const SUBMITTED: &str = "SUBMITTED";

/// Per-job status that triggers a resubmission suggestion.
pub const JOB_FAILED: &str = "FAILED";

/// Status of one job within a task: `(status, job_id)`.
///
/// Job ids are either bare (`"12"`, stage 0) or `<stage>-<subindex>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEntry(pub String, pub String);

impl JobEntry {
    pub fn new(status: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self(status.into(), job_id.into())
    }

    pub fn status(&self) -> &str {
        &self.0
    }

    pub fn job_id(&self) -> &str {
        &self.1
    }
}

/// What the job-submission service reports for a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// CRAB server bookkeeping status (`NEW`, `QUEUED`, `SUBMITTED`, ...).
    #[serde(rename = "dbStatus")]
    pub db_status: String,
    /// Aggregate DAG status, present once the task reached the scheduler.
    #[serde(rename = "dagStatus", default)]
    pub dag_status: Option<String>,
    #[serde(rename = "jobList", default)]
    pub job_list: Vec<JobEntry>,
}

/// Split a job id into `(stage, subindex)`.
///
/// Bare ids belong to stage 0. A stage prefix that is not a number also
/// falls back to stage 0.
pub fn split_job_id(job_id: &str) -> (u32, &str) {
    match job_id.split_once('-') {
        Some((stage, sub)) => (stage.parse().unwrap_or(0), sub),
        None => (0, job_id),
    }
}

/// Group job statuses by stage, then by subindex.
pub fn jobs_per_stage(jobs: &[JobEntry]) -> BTreeMap<u32, BTreeMap<String, String>> {
    let mut stages: BTreeMap<u32, BTreeMap<String, String>> = BTreeMap::new();
    for job in jobs {
        let (stage, sub) = split_job_id(job.job_id());
        stages
            .entry(stage)
            .or_default()
            .insert(sub.to_string(), job.status().to_string());
    }
    stages
}

/// Highest stage that has at least one job, if any.
pub fn highest_stage(jobs: &[JobEntry]) -> Option<u32> {
    jobs.iter().map(|job| split_job_id(job.job_id()).0).max()
}

/// True when any job of the highest stage has failed.
pub fn highest_stage_has_failure(jobs: &[JobEntry]) -> bool {
    let Some(top) = highest_stage(jobs) else {
        return false;
    };
    jobs_per_stage(jobs)
        .get(&top)
        .is_some_and(|stage| stage.values().any(|status| status == JOB_FAILED))
}

/// Map a raw status string onto a category.
///
/// Strings outside the closed set land in `UNKNOWN`.
pub fn category_for(status: &str) -> StatusCategory {
    StatusCategory::from_label(status).unwrap_or(StatusCategory::Unknown)
}

/// Classify one task.
///
/// 1. A service status other than `SUBMITTED` is the category.
/// 2. Otherwise the DAG status is the category (missing DAG status is `UNKNOWN`).
/// 3. A `SUBMITTED` DAG with a failed job in its highest stage is `TORESUBMIT`.
pub fn classify(report: &StatusReport) -> StatusCategory {
    if report.db_status != SUBMITTED {
        return category_for(&report.db_status);
    }

    let Some(dag_status) = report.dag_status.as_deref() else {
        return StatusCategory::Unknown;
    };

    if dag_status == SUBMITTED && highest_stage_has_failure(&report.job_list) {
        return StatusCategory::ToResubmit;
    }

    category_for(dag_status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted_with_jobs(jobs: &[(&str, &str)]) -> StatusReport {
        StatusReport {
            db_status: SUBMITTED.to_string(),
            dag_status: Some(SUBMITTED.to_string()),
            job_list: jobs
                .iter()
                .map(|(id, status)| JobEntry::new(*status, *id))
                .collect(),
        }
    }

    #[test]
    fn service_status_wins_before_submission() {
        let report = StatusReport {
            db_status: "QUEUED".into(),
            dag_status: Some("FAILED".into()),
            job_list: Vec::new(),
        };
        assert_eq!(classify(&report), StatusCategory::Queued);

        let report = StatusReport {
            db_status: "NEW".into(),
            ..StatusReport::default()
        };
        assert_eq!(classify(&report), StatusCategory::New);
    }

    #[test]
    fn dag_status_is_used_once_submitted() {
        let report = StatusReport {
            db_status: SUBMITTED.into(),
            dag_status: Some("COMPLETED".into()),
            job_list: vec![JobEntry::new("FAILED", "1")],
        };
        assert_eq!(classify(&report), StatusCategory::Completed);

        let report = StatusReport {
            db_status: SUBMITTED.into(),
            dag_status: Some("FAILED".into()),
            job_list: Vec::new(),
        };
        assert_eq!(classify(&report), StatusCategory::Failed);
    }

    #[test]
    fn failure_in_earlier_stage_does_not_trigger_resubmit() {
        let report =
            submitted_with_jobs(&[("0-1", "FAILED"), ("0-2", "FINISHED"), ("1-1", "RUNNING")]);
        assert_eq!(highest_stage(&report.job_list), Some(1));
        assert_eq!(classify(&report), StatusCategory::Submitted);
    }

    #[test]
    fn failure_in_only_stage_triggers_resubmit() {
        let report = submitted_with_jobs(&[("0-1", "FAILED"), ("0-2", "RUNNING")]);
        assert_eq!(highest_stage(&report.job_list), Some(0));
        assert_eq!(classify(&report), StatusCategory::ToResubmit);
    }

    #[test]
    fn bare_job_ids_belong_to_stage_zero() {
        let report = submitted_with_jobs(&[("1", "RUNNING"), ("2", "FAILED")]);
        assert_eq!(classify(&report), StatusCategory::ToResubmit);

        let report = submitted_with_jobs(&[("1", "FAILED"), ("1-3", "RUNNING")]);
        assert_eq!(classify(&report), StatusCategory::Submitted);
    }

    #[test]
    fn stages_compare_numerically() {
        let report = submitted_with_jobs(&[("2-1", "RUNNING"), ("10-1", "FAILED")]);
        assert_eq!(highest_stage(&report.job_list), Some(10));
        assert_eq!(classify(&report), StatusCategory::ToResubmit);
    }

    #[test]
    fn submitted_without_jobs_stays_submitted() {
        let report = submitted_with_jobs(&[]);
        assert_eq!(highest_stage(&report.job_list), None);
        assert_eq!(classify(&report), StatusCategory::Submitted);
    }

    #[test]
    fn missing_dag_status_is_unknown() {
        let report = StatusReport {
            db_status: SUBMITTED.into(),
            dag_status: None,
            job_list: Vec::new(),
        };
        assert_eq!(classify(&report), StatusCategory::Unknown);
    }

    #[test]
    fn unrecognised_status_is_unknown() {
        let report = StatusReport {
            db_status: "TRANSFERRING".into(),
            ..StatusReport::default()
        };
        assert_eq!(classify(&report), StatusCategory::Unknown);
    }

    #[test]
    fn jobs_per_stage_groups_by_prefix() {
        let jobs = vec![
            JobEntry::new("FAILED", "0-1"),
            JobEntry::new("FINISHED", "0-2"),
            JobEntry::new("RUNNING", "1-1"),
        ];
        let stages = jobs_per_stage(&jobs);
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[&0]["1"], "FAILED");
        assert_eq!(stages[&0]["2"], "FINISHED");
        assert_eq!(stages[&1]["1"], "RUNNING");
    }

    #[test]
    fn status_report_parses_client_json() {
        let json = r#"{
            "dbStatus": "SUBMITTED",
            "dagStatus": "SUBMITTED",
            "jobList": [["FAILED", "0-1"], ["RUNNING", "0-2"]],
            "taskWarningMsg": []
        }"#;
        let report: StatusReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.db_status, "SUBMITTED");
        assert_eq!(report.job_list[0], JobEntry::new("FAILED", "0-1"));
        assert_eq!(classify(&report), StatusCategory::ToResubmit);

        let report: StatusReport = serde_json::from_str(r#"{"dbStatus": "NEW"}"#).unwrap();
        assert!(report.dag_status.is_none());
        assert!(report.job_list.is_empty());
    }
}
