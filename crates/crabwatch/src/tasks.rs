//! Task enumeration.

use std::path::Path;

/// Names of the task directories under `tasks_dir`, sorted.
///
/// A missing `tasks_dir` yields no tasks. Plain files and names that are not
/// valid UTF-8 are skipped.
pub fn list_tasks(tasks_dir: &Path) -> std::io::Result<Vec<String>> {
    let entries = match std::fs::read_dir(tasks_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut tasks = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            tasks.push(name.to_string());
        }
    }
    tasks.sort();
    Ok(tasks)
}
