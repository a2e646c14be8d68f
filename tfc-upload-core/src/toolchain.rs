//! Pre-flight discovery of the external binaries the pipeline shells out to.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::archive::{is_gnu_tar, BsdTar, GnuTar};
use crate::config::{ArchiverChoice, SelectionPolicy};
use crate::contract::Archiver;
use crate::error::{UploadError, UploadResult};
use crate::vcs::Git;

/// Resolved paths of the external tools for one invocation.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub tar: PathBuf,
    pub gzip: PathBuf,
    pub git: Option<PathBuf>,
    gnu: bool,
}

impl Toolchain {
    /// Locate every tool the policy and archiver choice will need, failing
    /// before any work begins if one is absent.
    pub fn discover(policy: &SelectionPolicy, choice: ArchiverChoice) -> UploadResult<Self> {
        let tar = locate("tar")?;
        let gnu = match choice {
            ArchiverChoice::Gnu => true,
            ArchiverChoice::Bsd => false,
            ArchiverChoice::Auto => is_gnu_tar(&tar),
        };
        debug!(tar = %tar.display(), gnu, "Resolved tar");

        // `tar -z` spawns gzip itself, so it is needed on both paths.
        let gzip = locate("gzip")?;

        let git = if policy.tracked_only {
            Some(locate("git")?)
        } else {
            None
        };

        info!(gnu, tracked_only = policy.tracked_only, "Toolchain pre-flight passed");
        Ok(Self { tar, gzip, git, gnu })
    }

    /// The archiver implementation matching the discovered tar.
    pub fn archiver(&self) -> Box<dyn Archiver> {
        if self.gnu {
            Box::new(GnuTar::new(self.tar.clone(), self.gzip.clone()))
        } else {
            Box::new(BsdTar::new(self.tar.clone(), self.gzip.clone()))
        }
    }

    pub fn git(&self) -> Git {
        match &self.git {
            Some(path) => Git::new(path.clone()),
            None => Git::default(),
        }
    }
}

fn locate(tool: &str) -> UploadResult<PathBuf> {
    which::which(tool).map_err(|e| {
        tracing::error!(tool, error = %e, "Required external tool missing");
        UploadError::MissingExternalTool(tool.to_string())
    })
}
