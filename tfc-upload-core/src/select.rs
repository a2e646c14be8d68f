//! File selection: which relative paths under the configuration root get archived.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{SelectionPolicy, LOCAL_PLUGINS_DIR, MODULES_DIR, STATE_DIR, VCS_DIR};
use crate::error::{UploadError, UploadResult};
use crate::vcs::Git;

/// Ordered set of paths relative to the configuration root.
///
/// Pushing a path already present is a no-op, so duplicates cannot occur.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    paths: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the path was already present.
    pub fn push(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.seen.contains(&path) {
            return false;
        }
        self.seen.insert(path.clone());
        self.paths.push(path);
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Write the set as a NUL-terminated listing file, for `tar --null -T`.
    ///
    /// Names are written as raw bytes, so leading dashes, backslashes and
    /// newlines survive unchanged.
    pub fn write_listing(&self, dest: &Path) -> std::io::Result<()> {
        let mut file = fs::File::create(dest)?;
        for path in &self.paths {
            file.write_all(&path_bytes(path))?;
            file.write_all(b"\0")?;
        }
        file.flush()
    }
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

impl<P: Into<PathBuf>> FromIterator<P> for FileSet {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        let mut set = FileSet::new();
        for p in iter {
            set.push(p);
        }
        set
    }
}

impl<P: Into<PathBuf>> Extend<P> for FileSet {
    fn extend<I: IntoIterator<Item = P>>(&mut self, iter: I) {
        for p in iter {
            self.push(p);
        }
    }
}

/// Computes the [`FileSet`] for a root under a [`SelectionPolicy`].
pub struct FileSetSelector {
    root: PathBuf,
    policy: SelectionPolicy,
    git: Git,
}

impl FileSetSelector {
    pub fn new(root: impl Into<PathBuf>, policy: SelectionPolicy) -> Self {
        Self {
            root: root.into(),
            policy,
            git: Git::default(),
        }
    }

    pub fn with_git(mut self, git: Git) -> Self {
        self.git = git;
        self
    }

    pub fn select(&self) -> UploadResult<FileSet> {
        info!(root = %self.root.display(), policy = ?self.policy, "[SELECT] Selecting files");

        let mut files = if self.policy.tracked_only {
            let tracked = self.git.tracked_files(&self.root)?;
            let mut set = FileSet::new();
            for path in tracked {
                // Deleted-but-tracked entries and submodule gitlinks cannot be archived.
                match fs::symlink_metadata(self.root.join(&path)) {
                    Ok(meta) if !meta.is_dir() => {
                        set.push(path);
                    }
                    Ok(_) => debug!(path = %path.display(), "[SELECT] Skipping tracked directory entry"),
                    Err(_) => debug!(path = %path.display(), "[SELECT] Skipping tracked file missing from work tree"),
                }
            }
            set
        } else {
            let mut set = FileSet::new();
            walk(&self.root, Path::new(""), true, &mut set)?;
            set
        };

        if self.policy.include_modules {
            let before = files.len();
            self.append_optional_dir(MODULES_DIR, &mut files)?;
            debug!(added = files.len() - before, "[SELECT] Appended module cache");
        }
        if self.policy.include_local_plugins {
            let before = files.len();
            self.append_optional_dir(LOCAL_PLUGINS_DIR, &mut files)?;
            debug!(added = files.len() - before, "[SELECT] Appended local plugins");
        }

        info!(count = files.len(), "[SELECT] File selection complete");
        Ok(files)
    }

    fn append_optional_dir(&self, rel: &str, files: &mut FileSet) -> UploadResult<()> {
        let dir = self.root.join(rel);
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "[SELECT] Optional directory absent, nothing to add");
            return Ok(());
        }
        walk(&dir, Path::new(rel), false, files)
    }
}

/// Recursive walk appending files relative to the root. Entries are visited in
/// name order so the listing is reproducible.
fn walk(dir: &Path, rel: &Path, at_root: bool, out: &mut FileSet) -> UploadResult<()> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| UploadError::selection(format!("read {}", dir.display()), e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| UploadError::selection(format!("read {}", dir.display()), e))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name();
        if at_root && (name == VCS_DIR || name == STATE_DIR) {
            debug!(name = ?name, "[SELECT] Skipping excluded directory");
            continue;
        }
        let file_type = entry
            .file_type()
            .map_err(|e| UploadError::selection(format!("stat {}", entry.path().display()), e))?;
        let rel_path = rel.join(&name);
        if file_type.is_dir() {
            walk(&entry.path(), &rel_path, false, out)?;
        } else {
            out.push(rel_path);
        }
    }
    Ok(())
}
