//! Status summary and suggested follow-up commands.
//!
//! Pure text generation from a [`Snapshot`]; printing is left to the caller.

use std::path::PathBuf;

use crate::snapshot::Snapshot;
use crate::types::StatusCategory;

/// Categories that get suggested commands, in print order.
const ACTIONABLE: [StatusCategory; 4] = [
    StatusCategory::Completed,
    StatusCategory::SubmitFailed,
    StatusCategory::Failed,
    StatusCategory::ToResubmit,
];

/// Parse a site blacklist: one site per line, blank lines ignored.
pub fn parse_blacklist(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|site| !site.is_empty())
        .map(str::to_string)
        .collect()
}

/// ` --siteblacklist=a,b` for a non-empty site list, empty otherwise.
pub fn blacklist_flag(sites: &[String]) -> String {
    if sites.is_empty() {
        String::new()
    } else {
        format!(" --siteblacklist={}", sites.join(","))
    }
}

/// Inputs for building remediation commands.
#[derive(Debug, Clone)]
pub struct Remediation {
    /// Directory holding the task directories, as shown to the operator.
    pub tasks_dir: PathBuf,
    /// Post-processing command for completed tasks.
    pub post_crab_cmd: String,
    /// Sites to exclude on (re)submission.
    pub blacklist: Vec<String>,
}

impl Remediation {
    pub fn new(tasks_dir: impl Into<PathBuf>) -> Self {
        Self {
            tasks_dir: tasks_dir.into(),
            post_crab_cmd: "runPostCrab.py".to_string(),
            blacklist: Vec::new(),
        }
    }

    /// Set the post-processing command.
    pub fn with_post_crab_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.post_crab_cmd = cmd.into();
        self
    }

    /// Set the site blacklist.
    pub fn with_blacklist(mut self, sites: Vec<String>) -> Self {
        self.blacklist = sites;
        self
    }

    fn task_path(&self, task: &str) -> String {
        self.tasks_dir.join(task).display().to_string()
    }

    /// Suggested command for one task, if its category has one.
    pub fn command_for(&self, category: StatusCategory, task: &str) -> Option<String> {
        let flag = blacklist_flag(&self.blacklist);
        match category {
            StatusCategory::Completed => {
                Some(format!("{} {}", self.post_crab_cmd, self.task_path(task)))
            }
            StatusCategory::SubmitFailed => Some(format!(
                "rm -r {}; crab submit {task}.py{flag}",
                self.task_path(task)
            )),
            StatusCategory::Failed | StatusCategory::ToResubmit => {
                Some(format!("crab resubmit {}{flag}", self.task_path(task)))
            }
            _ => None,
        }
    }
}

/// Suggested commands for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionGroup {
    pub category: StatusCategory,
    pub commands: Vec<String>,
}

/// `<LABEL>: <count>` for each non-empty category, in declaration order.
pub fn summary_lines(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .iter()
        .map(|(category, tasks)| format!("{category}: {}", tasks.len()))
        .collect()
}

/// Suggested commands grouped by category; empty categories are skipped.
pub fn suggested_actions(snapshot: &Snapshot, remediation: &Remediation) -> Vec<ActionGroup> {
    ACTIONABLE
        .into_iter()
        .filter_map(|category| {
            let commands: Vec<String> = snapshot
                .tasks(category)
                .iter()
                .filter_map(|task| remediation.command_for(category, task))
                .collect();
            (!commands.is_empty()).then_some(ActionGroup { category, commands })
        })
        .collect()
}

/// Full report text: summary followed by suggested actions.
pub fn render_report(snapshot: &Snapshot, total_tasks: usize, remediation: &Remediation) -> String {
    let mut out = format!("##### ##### Status summary ({total_tasks} tasks) ##### #####\n");
    for line in summary_lines(snapshot) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str("##### ##### Suggested actions ##### #####\n");
    for group in suggested_actions(snapshot, remediation) {
        out.push_str(&format!("##### {} tasks #####\n", group.category));
        for command in group.commands {
            out.push_str(&command);
            out.push('\n');
        }
    }
    out
}
