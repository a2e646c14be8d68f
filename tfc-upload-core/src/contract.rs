//! # contract: the seams between the pipeline and the outside world
//!
//! Everything the core talks to that it does not own lives behind a trait here:
//!
//! - [`WorkspaceApi`]: the remote workspace service (workspaces, configuration
//!   versions, runs). Implemented over HTTP by the CLI crate.
//! - [`Archiver`]: the tar backend, with its hardlink-dereference capability flag.
//! - [`Sleeper`]: the only suspension point of the run tracker.
//! - [`LinkCounter`]: the filesystem link-count query used by the hardlink resolver.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`, and the mocks are exported under the
//!   default `test-export-mocks` feature so downstream crates can use them too.
//!
//! The remote data model ([`ConfigurationVersion`], [`Run`], [`RunStatus`],
//! [`WorkspaceLockState`]) is plain data; the tool observes it and never mutates it.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::UploadResult;

/// A server-side snapshot resource, created right before the archive upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationVersion {
    pub id: String,
    /// Pre-signed URL the archive bytes are PUT to.
    pub upload_url: String,
}

/// Remote run lifecycle status.
///
/// Unknown strings are kept verbatim in [`RunStatus::Other`] and count as terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Planning,
    Planned,
    Confirmed,
    Applying,
    Applied,
    PlannedAndFinished,
    Discarded,
    Errored,
    Canceled,
    ForceCanceled,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Planning => "planning",
            RunStatus::Planned => "planned",
            RunStatus::Confirmed => "confirmed",
            RunStatus::Applying => "applying",
            RunStatus::Applied => "applied",
            RunStatus::PlannedAndFinished => "planned_and_finished",
            RunStatus::Discarded => "discarded",
            RunStatus::Errored => "errored",
            RunStatus::Canceled => "canceled",
            RunStatus::ForceCanceled => "force_canceled",
            RunStatus::Other(s) => s,
        }
    }

    /// Statuses the poller keeps waiting on. Everything else ends the loop.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunStatus::Pending | RunStatus::Planning | RunStatus::Applying | RunStatus::Confirmed
        )
    }
}

impl From<&str> for RunStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => RunStatus::Pending,
            "planning" => RunStatus::Planning,
            "planned" => RunStatus::Planned,
            "confirmed" => RunStatus::Confirmed,
            "applying" => RunStatus::Applying,
            "applied" => RunStatus::Applied,
            "planned_and_finished" => RunStatus::PlannedAndFinished,
            "discarded" => RunStatus::Discarded,
            "errored" => RunStatus::Errored,
            "canceled" => RunStatus::Canceled,
            "force_canceled" => RunStatus::ForceCanceled,
            other => RunStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A server-side unit of work triggered by a configuration version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    /// Absent on runs whose relationship was not included in the listing.
    pub configuration_version_id: Option<String>,
}

/// Workspace lock as observed from the remote side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceLockState {
    pub locked: bool,
    pub lock_owner_id: Option<String>,
}

impl WorkspaceLockState {
    /// The lock owner, if the workspace is locked by someone other than `run_id`.
    pub fn locked_by_other(&self, run_id: &str) -> Option<&str> {
        match (&self.locked, self.lock_owner_id.as_deref()) {
            (true, Some(owner)) if owner != run_id => Some(owner),
            _ => None,
        }
    }
}

/// The remote workspace service.
///
/// Implementors own transport and authentication; every failure is mapped onto
/// the core error taxonomy (`ApiRequestFailed`, `MalformedResponse`, `UploadFailed`).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    /// Resolve a workspace name within an organization to its identifier.
    async fn workspace_id(&self, organization: &str, workspace: &str) -> UploadResult<String>;

    /// Create a configuration version in the workspace.
    async fn create_configuration_version(
        &self,
        workspace_id: &str,
    ) -> UploadResult<ConfigurationVersion>;

    /// PUT the archive bytes to a configuration version's upload URL.
    async fn upload_archive(&self, upload_url: &str, archive: &Path) -> UploadResult<()>;

    /// List the workspace's runs.
    async fn list_runs(&self, workspace_id: &str) -> UploadResult<Vec<Run>>;

    /// Fetch a single run.
    async fn get_run(&self, run_id: &str) -> UploadResult<Run>;

    /// Fetch the workspace's current lock state.
    async fn workspace_lock(&self, workspace_id: &str) -> UploadResult<WorkspaceLockState>;
}

/// A tar backend.
///
/// Paths passed as `root` are the directory archive members are relative to;
/// `listing` is a NUL-terminated file list relative to `root`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Archiver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the backend can store hardlinked files as full content in one pass.
    fn supports_hardlink_dereference(&self) -> bool;

    /// Build a gzip-compressed archive in a single pass.
    fn create_compressed(&self, root: &Path, listing: &Path, dest: &Path) -> UploadResult<()>;

    /// Build an uncompressed archive.
    fn create(&self, root: &Path, listing: &Path, dest: &Path) -> UploadResult<()>;

    /// Append one file to an uncompressed archive.
    fn append(&self, root: &Path, file: &Path, dest: &Path) -> UploadResult<()>;

    /// Gzip an uncompressed archive in place, returning the compressed path.
    fn compress(&self, archive: &Path) -> UploadResult<PathBuf>;
}

/// Pause between retry and polling iterations.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Filesystem link-count query.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait LinkCounter: Send + Sync {
    fn link_count(&self, path: &Path) -> std::io::Result<u64>;
}

/// Reads link counts from file metadata without following symlinks.
pub struct FsLinkCounter;

impl LinkCounter for FsLinkCounter {
    #[cfg(unix)]
    fn link_count(&self, path: &Path) -> std::io::Result<u64> {
        use std::os::unix::fs::MetadataExt;
        Ok(std::fs::symlink_metadata(path)?.nlink())
    }

    #[cfg(not(unix))]
    fn link_count(&self, path: &Path) -> std::io::Result<u64> {
        std::fs::symlink_metadata(path).map(|_| 1)
    }
}
