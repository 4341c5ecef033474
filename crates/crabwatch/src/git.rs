//! Source-control metadata for session identity.
//!
//! The framework and analysis checkouts are identified by their abbreviated
//! `HEAD` commit and the name of the repository they were cloned from.

use crabwatch_core::VersionIdentity;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git command failed: {0}")]
    CommandFailed(String),
    #[error("not a git repository: {0}")]
    NotARepo(String),
    #[error("failed to execute git: {0}")]
    Execution(#[from] std::io::Error),
    #[error("invalid utf-8 in git output")]
    InvalidUtf8,
}

pub type Result<T> = std::result::Result<T, GitError>;

/// Run git in `dir` and return trimmed stdout.
fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git").args(args).current_dir(dir).output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo(dir.display().to_string()));
        }
        return Err(GitError::CommandFailed(format!(
            "git {}: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8(output.stdout)
        .map_err(|_| GitError::InvalidUtf8)?
        .trim()
        .to_string())
}

/// Abbreviated hash of the last commit.
pub fn short_hash(dir: &Path) -> Result<String> {
    git(dir, &["log", "-n", "1", "--pretty=%h"])
}

/// URL of the `origin` remote, if one is configured.
pub fn remote_url(dir: &Path) -> Result<Option<String>> {
    let output = Command::new("git")
        .args(["config", "--get", "remote.origin.url"])
        .current_dir(dir)
        .output()?;

    // Exit code 1 means the key is unset.
    if !output.status.success() {
        return Ok(None);
    }
    let url = String::from_utf8(output.stdout)
        .map_err(|_| GitError::InvalidUtf8)?
        .trim()
        .to_string();
    Ok((!url.is_empty()).then_some(url))
}

/// Top-level directory of the checkout containing `dir`.
pub fn toplevel(dir: &Path) -> Result<String> {
    git(dir, &["rev-parse", "--show-toplevel"])
}

/// Get the repository directory name from a checkout root.
pub fn repo_name(workspace_root: &Path) -> String {
    workspace_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo")
        .to_string()
}

/// Repository name from a remote URL (`git@host:owner/Repo.git` → `Repo`).
pub fn repo_name_from_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

/// `owner/repo` path of a GitHub remote.
fn github_path(url: &str) -> Option<&str> {
    let path = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("https://github.com/"))
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))?;
    let path = path.trim_end_matches('/');
    Some(path.strip_suffix(".git").unwrap_or(path))
}

/// Link to the commit tree for GitHub remotes, otherwise the remote itself.
pub fn browse_url(remote: &str, hash: &str) -> String {
    match github_path(remote) {
        Some(path) => format!("https://github.com/{path}/tree/{hash}"),
        None => remote.to_string(),
    }
}

/// Commit hash, repository name and browsable URL for the checkout at `dir`.
///
/// Without an `origin` remote the repository is named after its top-level
/// directory.
pub fn version_identity(dir: &Path) -> Result<VersionIdentity> {
    let hash = short_hash(dir)?;
    match remote_url(dir)? {
        Some(remote) => Ok(VersionIdentity {
            url: browse_url(&remote, &hash),
            repo: repo_name_from_url(&remote),
            hash,
        }),
        None => {
            let root = toplevel(dir)?;
            Ok(VersionIdentity {
                repo: repo_name(Path::new(&root)),
                url: String::new(),
                hash,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Helper to create a temporary git repository with one commit.
    fn setup_test_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        Command::new("git")
            .args(["init"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.email", "test@test.com"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.name", "Test"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        std::fs::write(dir.path().join("analysis.py"), "process = None\n").unwrap();
        Command::new("git")
            .args(["add", "."])
            .current_dir(dir.path())
            .output()
            .unwrap();
        Command::new("git")
            .args(["commit", "-m", "Initial commit"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        dir
    }

    #[test]
    fn test_repo_name_from_url() {
        assert_eq!(
            repo_name_from_url("git@github.com:cp3-llbb/HHTools.git"),
            "HHTools"
        );
        assert_eq!(
            repo_name_from_url("https://github.com/cp3-llbb/Framework"),
            "Framework"
        );
        assert_eq!(
            repo_name_from_url("https://gitlab.cern.ch/cms/analysis.git/"),
            "analysis"
        );
        assert_eq!(repo_name_from_url("/srv/git/local.git"), "local");
    }

    #[test]
    fn test_browse_url() {
        assert_eq!(
            browse_url("git@github.com:cp3-llbb/HHTools.git", "a1b2c3d"),
            "https://github.com/cp3-llbb/HHTools/tree/a1b2c3d"
        );
        assert_eq!(
            browse_url("https://github.com/cp3-llbb/Framework", "a1b2c3d"),
            "https://github.com/cp3-llbb/Framework/tree/a1b2c3d"
        );
        assert_eq!(
            browse_url("https://gitlab.cern.ch/cms/analysis.git", "a1b2c3d"),
            "https://gitlab.cern.ch/cms/analysis.git"
        );
    }

    #[test]
    fn test_repo_name() {
        assert_eq!(repo_name(Path::new("/home/user/HHAnalysis")), "HHAnalysis");
    }

    #[test]
    fn test_version_identity_without_remote() {
        let dir = setup_test_repo();
        let identity = version_identity(dir.path()).unwrap();
        assert!(!identity.hash.is_empty());
        assert!(identity.hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(identity.url.is_empty());
        let expected = repo_name(&dir.path().canonicalize().unwrap());
        assert_eq!(identity.repo, expected);
    }

    #[test]
    fn test_version_identity_with_remote() {
        let dir = setup_test_repo();
        Command::new("git")
            .args([
                "remote",
                "add",
                "origin",
                "git@github.com:cp3-llbb/HHAnalysis.git",
            ])
            .current_dir(dir.path())
            .output()
            .unwrap();

        let identity = version_identity(dir.path()).unwrap();
        assert_eq!(identity.repo, "HHAnalysis");
        assert_eq!(
            identity.url,
            format!("https://github.com/cp3-llbb/HHAnalysis/tree/{}", identity.hash)
        );
    }

    #[test]
    fn test_version_identity_outside_repo() {
        let dir = TempDir::new().unwrap();
        assert!(version_identity(dir.path()).is_err());
    }
}
