pub mod classify;
pub mod config;
pub mod naming;
pub mod report;
pub mod snapshot;
pub mod types;

pub use classify::{classify, JobEntry, StatusReport};
pub use config::Config;
pub use report::Remediation;
pub use snapshot::Snapshot;
pub use types::*;
