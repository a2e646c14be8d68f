use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Version-control metadata directory, never archived.
pub const VCS_DIR: &str = ".git";
/// The tool's own state/cache directory, never archived by the full walk.
pub const STATE_DIR: &str = ".terraform";
/// Module cache, relative to the configuration root.
pub const MODULES_DIR: &str = ".terraform/modules";
/// Local plugin directory, relative to the configuration root.
pub const LOCAL_PLUGINS_DIR: &str = "terraform.d/plugins";

/// Which files make it into the archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Only archive files tracked by git.
    pub tracked_only: bool,
    /// Append the module cache.
    pub include_modules: bool,
    /// Append the local plugin directory.
    pub include_local_plugins: bool,
}

/// Which archiver implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArchiverChoice {
    /// Ask `tar --version` and pick accordingly.
    #[default]
    Auto,
    Gnu,
    Bsd,
}

impl From<&str> for ArchiverChoice {
    fn from(s: &str) -> Self {
        match s {
            "gnu" | "GNU" | "gnutar" => ArchiverChoice::Gnu,
            "bsd" | "BSD" | "bsdtar" => ArchiverChoice::Bsd,
            "auto" => ArchiverChoice::Auto,
            other => {
                tracing::warn!(archiver = other, "Unknown archiver choice, defaulting to auto");
                ArchiverChoice::Auto
            }
        }
    }
}

/// The immutable settings of one invocation, built once and passed to every stage.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub root: PathBuf,
    pub policy: SelectionPolicy,
    /// Zero disables status polling.
    pub poll_interval: Duration,
    pub organization: String,
    pub workspace: String,
    pub archiver: ArchiverChoice,
}

impl UploadConfig {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn polling_enabled(&self) -> bool {
        !self.poll_interval.is_zero()
    }

    pub fn trace_loaded(&self) {
        info!(
            root = %self.root.display(),
            organization = %self.organization,
            workspace = %self.workspace,
            tracked_only = self.policy.tracked_only,
            poll_secs = self.poll_interval.as_secs(),
            "Loaded UploadConfig"
        );
        debug!(?self, "UploadConfig loaded (full debug)");
    }
}
