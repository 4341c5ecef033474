//! Production snapshot: category → ordered list of task names.
//!
//! Persisted as a JSON object whose keys are the category labels and whose
//! values are arrays of task names. Every category key is always written.
//! A task name appears under at most one category.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::types::StatusCategory;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access snapshot {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid snapshot {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Task names grouped by status category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<StatusCategory, Vec<String>>")]
pub struct Snapshot {
    tasks: BTreeMap<StatusCategory, Vec<String>>,
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.tasks.serialize(serializer)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            tasks: StatusCategory::ALL
                .into_iter()
                .map(|category| (category, Vec::new()))
                .collect(),
        }
    }
}

impl From<BTreeMap<StatusCategory, Vec<String>>> for Snapshot {
    fn from(map: BTreeMap<StatusCategory, Vec<String>>) -> Self {
        let mut snapshot = Self::default();
        // Later categories win, so a recorded task stays recorded.
        for (category, tasks) in map {
            for task in tasks {
                snapshot.insert(category, task);
            }
        }
        snapshot
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a snapshot file.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let snapshot = serde_json::from_str(&content).map_err(|source| SnapshotError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(snapshot))
    }

    /// Write the snapshot, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|source| SnapshotError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Put a task under `category`, removing it from any other category.
    pub fn insert(&mut self, category: StatusCategory, task: impl Into<String>) {
        let task = task.into();
        match self.category_of(&task) {
            Some(current) if current == category => return,
            Some(current) => self.bucket_mut(current).retain(|t| *t != task),
            None => {}
        }
        self.bucket_mut(category).push(task);
    }

    /// Tasks under `category`, in insertion order.
    pub fn tasks(&self, category: StatusCategory) -> &[String] {
        self.tasks.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// Category a task is filed under, if any.
    pub fn category_of(&self, task: &str) -> Option<StatusCategory> {
        self.tasks
            .iter()
            .find(|(_, tasks)| tasks.iter().any(|t| t == task))
            .map(|(category, _)| *category)
    }

    /// Number of tasks under `category`.
    pub fn count(&self, category: StatusCategory) -> usize {
        self.tasks(category).len()
    }

    /// Total number of tasks across all categories.
    pub fn len(&self) -> usize {
        self.tasks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-empty categories with their tasks, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (StatusCategory, &[String])> {
        self.tasks
            .iter()
            .filter(|(_, tasks)| !tasks.is_empty())
            .map(|(category, tasks)| (*category, tasks.as_slice()))
    }

    fn bucket_mut(&mut self, category: StatusCategory) -> &mut Vec<String> {
        self.tasks.entry(category).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_snapshot_has_every_category() {
        let snapshot = Snapshot::new();
        let json: serde_json::Value = serde_json::to_value(&snapshot).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), StatusCategory::ALL.len());
        for category in StatusCategory::ALL {
            assert_eq!(object[category.as_str()], serde_json::json!([]));
        }
        assert!(snapshot.is_empty());
    }

    #[test]
    fn insert_moves_task_between_categories() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(StatusCategory::Completed, "crab_TT");
        snapshot.insert(StatusCategory::Completed, "crab_DY");
        snapshot.insert(StatusCategory::Recorded, "crab_TT");

        assert_eq!(snapshot.tasks(StatusCategory::Completed), ["crab_DY"]);
        assert_eq!(snapshot.tasks(StatusCategory::Recorded), ["crab_TT"]);
        assert_eq!(snapshot.category_of("crab_TT"), Some(StatusCategory::Recorded));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn insert_same_category_is_noop() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(StatusCategory::Queued, "crab_TT");
        snapshot.insert(StatusCategory::Queued, "crab_TT");
        assert_eq!(snapshot.count(StatusCategory::Queued), 1);
    }

    #[test]
    fn iter_skips_empty_categories_in_order() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(StatusCategory::Failed, "b");
        snapshot.insert(StatusCategory::Completed, "a");
        let categories: Vec<_> = snapshot.iter().map(|(c, _)| c).collect();
        assert_eq!(
            categories,
            vec![StatusCategory::Completed, StatusCategory::Failed]
        );
    }

    #[test]
    fn parse_prefers_recorded_for_duplicates() {
        let json = r#"{"COMPLETED": ["crab_TT"], "GRIDIN-INDB": ["crab_TT", "crab_DY"]}"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.tasks(StatusCategory::Completed).is_empty());
        assert_eq!(snapshot.tasks(StatusCategory::Recorded), ["crab_TT", "crab_DY"]);
        assert!(snapshot.tasks(StatusCategory::Holding).is_empty());
    }

    #[test]
    fn parse_rejects_unknown_category() {
        let json = r#"{"COMPLETED": [], "EXPLODED": ["crab_TT"]}"#;
        assert!(serde_json::from_str::<Snapshot>(json).is_err());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prod_default.json");

        let mut snapshot = Snapshot::new();
        snapshot.insert(StatusCategory::Completed, "crab_TT");
        snapshot.insert(StatusCategory::ToResubmit, "crab_DY");
        snapshot.insert(StatusCategory::Recorded, "crab_WW");
        snapshot.insert(StatusCategory::Completed, "crab_ZZ");
        snapshot.save(&path).unwrap();

        let loaded = Snapshot::load(&path).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.tasks(StatusCategory::Completed), ["crab_TT", "crab_ZZ"]);
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = Snapshot::load(&dir.path().join("prod_missing.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_invalid_json_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prod_default.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Snapshot::load(&path),
            Err(SnapshotError::Parse { .. })
        ));
    }

    #[test]
    fn save_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prod_default.json");

        let mut first = Snapshot::new();
        first.insert(StatusCategory::Queued, "crab_TT");
        first.save(&path).unwrap();

        let mut second = Snapshot::new();
        second.insert(StatusCategory::Completed, "crab_TT");
        second.save(&path).unwrap();

        let loaded = Snapshot::load(&path).unwrap().unwrap();
        assert_eq!(loaded, second);
    }
}
