//! Configuration parsing for the production monitor.
//!
//! Key=value format, read from `.crabwatch/config` in the working directory.
//! Precedence: CLI flags > `--config` file > `.crabwatch/config` > defaults.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Per-workspace config file, relative to the working directory.
pub const WORKSPACE_CONFIG: &str = ".crabwatch/config";

/// Environment variable holding the sample database URL.
pub const DB_URL_ENV: &str = "CRABWATCH_DB_URL";

/// Framework checkout relative to `$CMSSW_BASE`.
const FRAMEWORK_SUBDIR: &str = "src/cp3_llbb/Framework";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("invalid config line: {0}")]
    InvalidLine(String),
    #[error("invalid boolean value for {key}: {value}")]
    InvalidBool { key: String, value: String },
}

/// Monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // Directories
    pub tasks_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    /// Framework checkout whose commit identifies the session.
    pub framework_dir: Option<PathBuf>,
    /// Analysis configuration file; read from the first task's CRAB config when unset.
    pub analysis_config: Option<PathBuf>,
    pub blacklist_file: PathBuf,

    // External services
    pub crab_bin: PathBuf,
    pub record_store_url: Option<String>,

    // Naming
    /// Prefix dropped from task names to get sample names.
    pub task_prefix: String,
    /// Post-processing command suggested for completed tasks.
    pub post_crab_cmd: String,

    /// Poll tasks already marked COMPLETED again.
    pub recheck_completed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tasks_dir: PathBuf::from("tasks"),
            snapshot_dir: PathBuf::from("."),
            framework_dir: std::env::var_os("CMSSW_BASE")
                .map(|base| PathBuf::from(base).join(FRAMEWORK_SUBDIR)),
            analysis_config: None,
            blacklist_file: PathBuf::from("blacklist.txt"),
            crab_bin: PathBuf::from("crab"),
            record_store_url: std::env::var(DB_URL_ENV).ok().filter(|url| !url.is_empty()),
            task_prefix: "crab_".to_string(),
            post_crab_cmd: "runPostCrab.py".to_string(),
            recheck_completed: false,
        }
    }
}

impl Config {
    /// Defaults, then `.crabwatch/config` under `workspace` if present, then `explicit`.
    pub fn load(workspace: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let workspace_config = workspace.join(WORKSPACE_CONFIG);
        if workspace_config.is_file() {
            config.load_file(&workspace_config)?;
        }
        if let Some(path) = explicit {
            config.load_file(path)?;
        }
        Ok(config)
    }

    /// Load and merge values from a config file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        self.parse_content(&content)
    }

    /// Parse config content (key=value format).
    fn parse_content(&mut self, content: &str) -> Result<(), ConfigError> {
        for line in content.lines() {
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine(line.to_string()));
            };

            let key = key.trim();
            let value = Self::unquote(value.trim());

            self.apply_value(key, &value)?;
        }
        Ok(())
    }

    /// Remove surrounding quotes from a value.
    fn unquote(value: &str) -> String {
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            return value[1..value.len() - 1].to_string();
        }
        value.to_string()
    }

    fn optional_path(value: &str) -> Option<PathBuf> {
        if value.is_empty() {
            None
        } else {
            Some(PathBuf::from(value))
        }
    }

    /// Apply a single config value.
    fn apply_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "tasks_dir" => self.tasks_dir = PathBuf::from(value),
            "snapshot_dir" => self.snapshot_dir = PathBuf::from(value),
            "framework_dir" => self.framework_dir = Self::optional_path(value),
            "analysis_config" => self.analysis_config = Self::optional_path(value),
            "blacklist_file" => self.blacklist_file = PathBuf::from(value),
            "crab_bin" => self.crab_bin = PathBuf::from(value),
            "record_store_url" => {
                self.record_store_url = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "task_prefix" => self.task_prefix = value.to_string(),
            "post_crab_cmd" => {
                if value.is_empty() {
                    return Err(ConfigError::InvalidLine(
                        "post_crab_cmd must not be empty".to_string(),
                    ));
                }
                self.post_crab_cmd = value.to_string();
            }
            "recheck_completed" => self.recheck_completed = Self::parse_bool(key, value)?,
            _ => {
                warn!(key, "unknown config key");
            }
        }
        Ok(())
    }

    /// Parse a boolean value.
    fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "on" => Ok(true),
            "false" | "0" | "no" | "n" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.tasks_dir, PathBuf::from("tasks"));
        assert_eq!(config.snapshot_dir, PathBuf::from("."));
        assert_eq!(config.blacklist_file, PathBuf::from("blacklist.txt"));
        assert_eq!(config.crab_bin, PathBuf::from("crab"));
        assert_eq!(config.task_prefix, "crab_");
        assert_eq!(config.post_crab_cmd, "runPostCrab.py");
        assert!(config.analysis_config.is_none());
        assert!(!config.recheck_completed);
    }

    #[test]
    fn parse_simple_config() {
        let mut config = Config::default();
        let content = r#"
# production of 2016 samples
tasks_dir=prod2016/tasks
crab_bin="/cvmfs/cms.cern.ch/crab3/crab"
record_store_url='mysql://reader@localhost/samadhi'
recheck_completed=yes
"#;
        config.parse_content(content).unwrap();
        assert_eq!(config.tasks_dir, PathBuf::from("prod2016/tasks"));
        assert_eq!(config.crab_bin, PathBuf::from("/cvmfs/cms.cern.ch/crab3/crab"));
        assert_eq!(
            config.record_store_url.as_deref(),
            Some("mysql://reader@localhost/samadhi")
        );
        assert!(config.recheck_completed);
    }

    #[test]
    fn empty_values_clear_optional_settings() {
        let mut config = Config::default();
        config
            .parse_content("framework_dir=\nrecord_store_url=\"\"\nanalysis_config=")
            .unwrap();
        assert!(config.framework_dir.is_none());
        assert!(config.record_store_url.is_none());
        assert!(config.analysis_config.is_none());
    }

    #[test]
    fn missing_equals_is_invalid() {
        let mut config = Config::default();
        let result = config.parse_content("tasks_dir tasks");
        assert!(matches!(result, Err(ConfigError::InvalidLine(_))));
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let mut config = Config::default();
        let result = config.parse_content("recheck_completed=maybe");
        assert!(matches!(result, Err(ConfigError::InvalidBool { .. })));
    }

    #[test]
    fn unknown_key_is_ignored() {
        let mut config = Config::default();
        config.parse_content("mode=babysit\ntasks_dir=t").unwrap();
        assert_eq!(config.tasks_dir, PathBuf::from("t"));
    }

    #[test]
    fn unquote_removes_quotes() {
        assert_eq!(Config::unquote("\"hello\""), "hello");
        assert_eq!(Config::unquote("'world'"), "world");
        assert_eq!(Config::unquote("noquotes"), "noquotes");
        assert_eq!(Config::unquote("\""), "\"");
    }

    #[test]
    fn explicit_file_overrides_workspace_file() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".crabwatch")).unwrap();
        std::fs::write(
            dir.path().join(WORKSPACE_CONFIG),
            "tasks_dir=ws-tasks\npost_crab_cmd=ws-post.py\n",
        )
        .unwrap();
        let explicit = dir.path().join("override.conf");
        std::fs::write(&explicit, "tasks_dir=cli-tasks\n").unwrap();

        let config = Config::load(dir.path(), Some(&explicit)).unwrap();
        assert_eq!(config.tasks_dir, PathBuf::from("cli-tasks"));
        assert_eq!(config.post_crab_cmd, "ws-post.py");
    }

    #[test]
    fn load_without_files_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path(), None).unwrap();
        assert_eq!(config.tasks_dir, PathBuf::from("tasks"));
    }
}
