//! Hardlink partitioning for archivers that cannot dereference links themselves.

use std::path::Path;
use tracing::{debug, info};

use crate::contract::LinkCounter;
use crate::error::{UploadError, UploadResult};
use crate::select::FileSet;

/// How the selected files are split between the base archive and per-file appends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchivePlan {
    pub direct: FileSet,
    pub hardlinked: FileSet,
}

impl ArchivePlan {
    /// A plan with every file in the direct partition.
    pub fn all_direct(files: FileSet) -> Self {
        Self {
            direct: files,
            hardlinked: FileSet::new(),
        }
    }

    /// True when no file needs special handling.
    pub fn is_trivial(&self) -> bool {
        self.hardlinked.is_empty()
    }

    pub fn len(&self) -> usize {
        self.direct.len() + self.hardlinked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Direct files followed by hardlinked files.
    pub fn files(&self) -> FileSet {
        self.direct
            .iter()
            .chain(self.hardlinked.iter())
            .cloned()
            .collect()
    }
}

/// Partitions a selection by link count.
pub struct HardlinkResolver<'a, L: LinkCounter + ?Sized> {
    root: &'a Path,
    links: &'a L,
}

impl<'a, L: LinkCounter + ?Sized> HardlinkResolver<'a, L> {
    pub fn new(root: &'a Path, links: &'a L) -> Self {
        Self { root, links }
    }

    /// Split `files` into hardlinked (link count > 1) and direct subsets,
    /// preserving selection order in both.
    pub fn resolve(&self, files: &FileSet) -> UploadResult<ArchivePlan> {
        let mut plan = ArchivePlan::default();
        for rel in files.iter() {
            let count = self
                .links
                .link_count(&self.root.join(rel))
                .map_err(|e| UploadError::archive(format!("stat {}", rel.display()), e))?;
            if count > 1 {
                debug!(path = %rel.display(), links = count, "[ARCHIVE] Hardlinked file");
                plan.hardlinked.push(rel.clone());
            } else {
                plan.direct.push(rel.clone());
            }
        }
        info!(
            direct = plan.direct.len(),
            hardlinked = plan.hardlinked.len(),
            "[ARCHIVE] Hardlink partition computed"
        );
        Ok(plan)
    }
}

/// Build the plan for a selection given the archiver capability. The resolver
/// is only consulted when the archiver cannot dereference hardlinks.
pub fn plan_for<L: LinkCounter + ?Sized>(
    root: &Path,
    files: FileSet,
    supports_dereference: bool,
    links: &L,
) -> UploadResult<ArchivePlan> {
    if supports_dereference {
        debug!("[ARCHIVE] Archiver dereferences hardlinks, skipping partition");
        return Ok(ArchivePlan::all_direct(files));
    }
    HardlinkResolver::new(root, links).resolve(&files)
}
