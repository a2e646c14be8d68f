use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{UploadError, UploadResult};

/// The git command-line client, used only to list tracked files.
#[derive(Debug, Clone)]
pub struct Git {
    program: PathBuf,
}

impl Default for Git {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl Git {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// True if `root` lies inside a git work tree.
    pub fn is_work_tree(&self, root: &Path) -> bool {
        let output = Command::new(&self.program)
            .arg("-C")
            .arg(root)
            .args(["rev-parse", "--is-inside-work-tree"])
            .output();

        match output {
            Ok(out) if out.status.success() => {
                String::from_utf8_lossy(&out.stdout).trim() == "true"
            }
            Ok(out) => {
                tracing::debug!(
                    root = %root.display(),
                    status = %out.status,
                    "git rev-parse reports no work tree"
                );
                false
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to launch git rev-parse");
                false
            }
        }
    }

    /// Tracked files under `root`, relative to `root`, in index order.
    pub fn tracked_files(&self, root: &Path) -> UploadResult<Vec<PathBuf>> {
        if !self.is_work_tree(root) {
            return Err(UploadError::NoVcsDetected(root.to_path_buf()));
        }

        let out = Command::new(&self.program)
            .arg("-C")
            .arg(root)
            .args(["ls-files", "-z"])
            .output()
            .map_err(|e| UploadError::selection("launch git ls-files", e))?;

        if !out.status.success() {
            tracing::error!(
                root = %root.display(),
                stderr = %String::from_utf8_lossy(&out.stderr),
                "git ls-files exited with non-zero code"
            );
            return Err(UploadError::SelectionFailed(format!(
                "git ls-files exited with {}",
                out.status
            )));
        }

        Ok(parse_nul_separated(&out.stdout))
    }
}

fn parse_nul_separated(stdout: &[u8]) -> Vec<PathBuf> {
    stdout
        .split(|b| *b == 0)
        .filter(|entry| !entry.is_empty())
        .map(path_from_bytes)
        .collect()
}

// Names are raw bytes on unix; a lossy decode would point at a file that does not exist.
#[cfg(unix)]
fn path_from_bytes(entry: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(entry))
}

#[cfg(not(unix))]
fn path_from_bytes(entry: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(entry).into_owned())
}
