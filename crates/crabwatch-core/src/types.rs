//! Core types for the production monitor.
//!
//! A task is identified by its submission directory name; everything the
//! monitor learns about it collapses into one [`StatusCategory`] per pass.

use serde::{Deserialize, Serialize};

// --- Enumerations ---

/// Lifecycle category of a CRAB task for one reconciliation pass.
///
/// Declaration order is the order categories are written to the snapshot
/// file and printed in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCategory {
    Completed,
    #[serde(rename = "SUBMITFAILED")]
    SubmitFailed,
    #[serde(rename = "RESUBMITFAILED")]
    ResubmitFailed,
    New,
    Submitted,
    #[serde(rename = "TORESUBMIT")]
    ToResubmit,
    Unknown,
    Queued,
    Failed,
    Killed,
    Holding,
    /// Output catalogued in the sample database.
    #[serde(rename = "GRIDIN-INDB")]
    Recorded,
}

impl StatusCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Completed,
        Self::SubmitFailed,
        Self::ResubmitFailed,
        Self::New,
        Self::Submitted,
        Self::ToResubmit,
        Self::Unknown,
        Self::Queued,
        Self::Failed,
        Self::Killed,
        Self::Holding,
        Self::Recorded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::SubmitFailed => "SUBMITFAILED",
            Self::ResubmitFailed => "RESUBMITFAILED",
            Self::New => "NEW",
            Self::Submitted => "SUBMITTED",
            Self::ToResubmit => "TORESUBMIT",
            Self::Unknown => "UNKNOWN",
            Self::Queued => "QUEUED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
            Self::Holding => "HOLDING",
            Self::Recorded => "GRIDIN-INDB",
        }
    }

    /// Look up a category by its snapshot label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }
}

impl std::fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Session identity ---

/// Source-control identity of a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionIdentity {
    /// Abbreviated commit hash of `HEAD`.
    pub hash: String,
    /// Repository name (last segment of the origin URL).
    pub repo: String,
    /// Browsable URL for the commit, or the bare remote URL.
    pub url: String,
}

/// Identifiers of a monitoring session.
///
/// Embedded in the snapshot file name and in record-store lookup keys.
/// All fields are empty for the default (unnamed) session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub framework_hash: String,
    pub analysis_repo: String,
    pub analysis_hash: String,
}

impl SessionIdentity {
    pub fn new(
        framework_hash: impl Into<String>,
        analysis_repo: impl Into<String>,
        analysis_hash: impl Into<String>,
    ) -> Self {
        Self {
            framework_hash: framework_hash.into(),
            analysis_repo: analysis_repo.into(),
            analysis_hash: analysis_hash.into(),
        }
    }

    /// Build a session identity from the framework and analysis checkouts.
    pub fn from_versions(framework: &VersionIdentity, analysis: &VersionIdentity) -> Self {
        Self::new(&framework.hash, &analysis.repo, &analysis.hash)
    }

    pub fn is_empty(&self) -> bool {
        self.framework_hash.is_empty()
            && self.analysis_repo.is_empty()
            && self.analysis_hash.is_empty()
    }
}
