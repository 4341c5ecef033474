//! Session identity resolution.
//!
//! A monitoring session is named after the framework commit and the analysis
//! repository/commit the tasks were submitted with. A new session computes
//! these from the checkouts; a continuing session recovers them from the
//! name of the most recent snapshot file.

use chrono::{DateTime, Local};
use crabwatch_core::naming::{self, NamingError, DEFAULT_SNAPSHOT};
use crabwatch_core::{SessionIdentity, VersionIdentity};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::git::{self, GitError};

/// `config.JobType.psetName = '...'` in a CRAB config file.
static PSET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"psetName\s*=\s*['"]([^'"]+)['"]"#).expect("invalid psetName pattern")
});

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no task to monitor in {0}")]
    NoTasks(String),
    #[error("framework directory is not set (is CMSSW_BASE defined?)")]
    FrameworkDirUnset,
    #[error("failed to read CRAB config {path}: {source}")]
    CrabConfig {
        path: String,
        source: std::io::Error,
    },
    #[error("no psetName in CRAB config {0}")]
    MissingPset(String),
    #[error("failed to scan {path} for snapshots: {source}")]
    Scan {
        path: String,
        source: std::io::Error,
    },
    #[error("git error: {0}")]
    Git(#[from] GitError),
    #[error(transparent)]
    Naming(#[from] NamingError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// External state session resolution depends on.
pub trait SessionSource {
    /// Analysis configuration file the task was submitted with.
    fn analysis_config(&self, task: &str) -> Result<PathBuf>;

    /// Source-control identity of the checkout containing `dir`.
    fn version_identity(&self, dir: &Path) -> Result<VersionIdentity>;

    /// Most recently modified `prod_*.json` file in `dir`.
    fn newest_snapshot(&self, dir: &Path) -> Result<Option<PathBuf>>;
}

/// What the operator asked for.
#[derive(Debug, Clone, Default)]
pub struct SessionRequest {
    /// Start a new session from the current checkouts.
    pub new_session: bool,
    /// Snapshot file named on the command line.
    pub snapshot_override: Option<PathBuf>,
    pub framework_dir: Option<PathBuf>,
    pub snapshot_dir: PathBuf,
}

/// Resolved session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: SessionIdentity,
    pub snapshot_path: PathBuf,
}

/// Resolve the session identity and snapshot path.
pub fn resolve_session<S: SessionSource>(
    source: &S,
    tasks: &[String],
    request: &SessionRequest,
) -> Result<Session> {
    if request.new_session {
        return new_session(source, tasks, request);
    }

    if let Some(path) = &request.snapshot_override {
        // Any file name may be given here, so an unparseable one is not fatal.
        let identity = match naming::parse_snapshot_path(path) {
            Ok(identity) => identity.unwrap_or_default(),
            Err(err) => {
                warn!(snapshot = %path.display(), error = %err, "ignoring session identity in snapshot name");
                SessionIdentity::default()
            }
        };
        if identity.is_empty() {
            debug!(snapshot = %path.display(), "snapshot name carries no session identity");
        }
        return Ok(Session {
            identity,
            snapshot_path: path.clone(),
        });
    }

    match source.newest_snapshot(&request.snapshot_dir)? {
        Some(path) => {
            let identity = naming::parse_snapshot_path(&path)?.unwrap_or_default();
            info!(snapshot = %path.display(), "continuing with most recent snapshot");
            Ok(Session {
                identity,
                snapshot_path: path,
            })
        }
        None => Ok(Session {
            identity: SessionIdentity::default(),
            snapshot_path: request.snapshot_dir.join(DEFAULT_SNAPSHOT),
        }),
    }
}

fn new_session<S: SessionSource>(
    source: &S,
    tasks: &[String],
    request: &SessionRequest,
) -> Result<Session> {
    // All tasks of a production share one analysis configuration.
    let Some(first_task) = tasks.first() else {
        return Err(SessionError::NoTasks(request.snapshot_dir.display().to_string()));
    };
    if let Some(path) = &request.snapshot_override {
        warn!(snapshot = %path.display(), "ignoring snapshot override for a new session");
    }
    let framework_dir = request
        .framework_dir
        .as_deref()
        .ok_or(SessionError::FrameworkDirUnset)?;

    let analysis_config = source.analysis_config(first_task)?;
    let analysis_dir = analysis_config
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let framework = source.version_identity(framework_dir)?;
    info!(hash = %framework.hash, repo = %framework.repo, url = %framework.url, "framework version");
    let analysis = source.version_identity(analysis_dir)?;
    info!(hash = %analysis.hash, repo = %analysis.repo, url = %analysis.url, "analysis version");

    let identity = SessionIdentity::from_versions(&framework, &analysis);
    let snapshot_path = request
        .snapshot_dir
        .join(naming::snapshot_file_name(&identity));
    info!(snapshot = %snapshot_path.display(), "starting new production snapshot");
    Ok(Session {
        identity,
        snapshot_path,
    })
}

/// Extract `psetName` from CRAB config text.
pub fn pset_name(config_text: &str) -> Option<String> {
    PSET_PATTERN
        .captures(config_text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// [`SessionSource`] over the working directory, git, and the filesystem.
#[derive(Debug, Clone)]
pub struct FsSessionSource {
    workspace: PathBuf,
    analysis_override: Option<PathBuf>,
}

impl FsSessionSource {
    pub fn new(workspace: impl Into<PathBuf>, analysis_override: Option<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            analysis_override,
        }
    }

    /// CRAB config a task was submitted from: `<task>.py` in the workspace.
    pub fn crab_config_path(&self, task: &str) -> PathBuf {
        self.workspace.join(format!("{task}.py"))
    }
}

impl SessionSource for FsSessionSource {
    fn analysis_config(&self, task: &str) -> Result<PathBuf> {
        if let Some(path) = &self.analysis_override {
            return Ok(self.workspace.join(path));
        }
        let crab_config = self.crab_config_path(task);
        let text = std::fs::read_to_string(&crab_config).map_err(|source| {
            SessionError::CrabConfig {
                path: crab_config.display().to_string(),
                source,
            }
        })?;
        let pset = pset_name(&text)
            .ok_or_else(|| SessionError::MissingPset(crab_config.display().to_string()))?;
        Ok(self.workspace.join(pset))
    }

    fn version_identity(&self, dir: &Path) -> Result<VersionIdentity> {
        Ok(git::version_identity(dir)?)
    }

    fn newest_snapshot(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let scan_error = |source| SessionError::Scan {
            path: dir.display().to_string(),
            source,
        };
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(scan_error(err)),
        };

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for entry in entries {
            let entry = entry.map_err(scan_error)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !naming::is_snapshot_file_name(name) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(scan_error)?;
            if newest.as_ref().map_or(true, |(time, _)| modified > *time) {
                newest = Some((modified, entry.path()));
            }
        }

        if let Some((modified, path)) = &newest {
            let modified: DateTime<Local> = (*modified).into();
            debug!(
                snapshot = %path.display(),
                modified = %modified.format("%Y-%m-%d %H:%M:%S"),
                "newest snapshot"
            );
        }
        Ok(newest.map(|(_, path)| path))
    }
}
