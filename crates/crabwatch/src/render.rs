//! Console report.

use crabwatch_core::report::{parse_blacklist, render_report};
use crabwatch_core::{Remediation, Snapshot};
use std::path::Path;
use tracing::debug;

/// Sites listed in the blacklist file; a missing file lists none.
pub fn read_blacklist(path: &Path) -> std::io::Result<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(parse_blacklist(&content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no blacklist file");
            Ok(Vec::new())
        }
        Err(err) => Err(err),
    }
}

/// Print the status summary and suggested commands to stdout.
pub fn print_report(snapshot: &Snapshot, total_tasks: usize, remediation: &Remediation) {
    print!("{}", render_report(snapshot, total_tasks, remediation));
}
