//! Snapshot file names and record-store keys.
//!
//! A named session writes `prod_<frameworkHash>_<analysisRepo>_<analysisHash>.json`.
//! The separator is not escaped, so a repository name containing `_` cannot
//! be recovered from the file name; parsing rejects such names instead of
//! guessing where the fields split.

use std::path::Path;

use thiserror::Error;

use crate::types::SessionIdentity;

/// File name prefix shared by all snapshot files.
pub const SNAPSHOT_PREFIX: &str = "prod_";

/// File name suffix shared by all snapshot files.
pub const SNAPSHOT_SUFFIX: &str = ".json";

/// Snapshot used when no session identity is known.
pub const DEFAULT_SNAPSHOT: &str = "prod_default.json";

/// Separator between identity fields in file names and record keys.
pub const SEPARATOR: char = '_';

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("cannot split snapshot name {name} into framework hash, analysis repo and analysis hash")]
    AmbiguousSnapshotName { name: String },
}

pub type Result<T> = std::result::Result<T, NamingError>;

/// File name for a session's snapshot.
pub fn snapshot_file_name(identity: &SessionIdentity) -> String {
    if identity.is_empty() {
        return DEFAULT_SNAPSHOT.to_string();
    }
    format!(
        "{SNAPSHOT_PREFIX}{}{SEPARATOR}{}{SEPARATOR}{}{SNAPSHOT_SUFFIX}",
        identity.framework_hash, identity.analysis_repo, identity.analysis_hash
    )
}

/// True for `prod_*.json` file names.
pub fn is_snapshot_file_name(name: &str) -> bool {
    name.len() >= SNAPSHOT_PREFIX.len() + SNAPSHOT_SUFFIX.len()
        && name.starts_with(SNAPSHOT_PREFIX)
        && name.ends_with(SNAPSHOT_SUFFIX)
}

/// Recover the session identity from a snapshot path.
///
/// Returns `Ok(None)` for the default snapshot and for files outside the
/// `prod_*.json` pattern.
pub fn parse_snapshot_path(path: &Path) -> Result<Option<SessionIdentity>> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };
    parse_snapshot_file_name(name)
}

/// Recover the session identity from a snapshot file name.
///
/// Names with fewer than three fields (`prod_summer16.json`) or an empty
/// field carry no identity. More than three fields is ambiguous because the
/// repository name itself may contain the separator.
pub fn parse_snapshot_file_name(name: &str) -> Result<Option<SessionIdentity>> {
    if name == DEFAULT_SNAPSHOT || !is_snapshot_file_name(name) {
        return Ok(None);
    }
    let stem = &name[SNAPSHOT_PREFIX.len()..name.len() - SNAPSHOT_SUFFIX.len()];
    let fields: Vec<&str> = stem.split(SEPARATOR).collect();
    match fields.as_slice() {
        [framework_hash, analysis_repo, analysis_hash]
            if !framework_hash.is_empty()
                && !analysis_repo.is_empty()
                && !analysis_hash.is_empty() =>
        {
            Ok(Some(SessionIdentity::new(
                *framework_hash,
                *analysis_repo,
                *analysis_hash,
            )))
        }
        [_, _, _, _, ..] => Err(NamingError::AmbiguousSnapshotName {
            name: name.to_string(),
        }),
        _ => Ok(None),
    }
}

/// Sample-database name for a task's output.
///
/// The task prefix (e.g. `crab_`) is dropped and the session identity is
/// appended: `<sample>_<frameworkHash>_<analysisRepo>_<analysisHash>`.
pub fn record_key(task: &str, task_prefix: &str, identity: &SessionIdentity) -> String {
    let sample = task.strip_prefix(task_prefix).unwrap_or(task);
    format!(
        "{sample}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
        identity.framework_hash, identity.analysis_repo, identity.analysis_hash
    )
}
