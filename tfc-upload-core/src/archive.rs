//! Archive construction.
//!
//! Two interchangeable [`Archiver`] backends shell out to the system `tar`:
//! [`GnuTar`] can store hardlinked files as full content (`--hard-dereference`),
//! [`BsdTar`] cannot. [`ArchiveBuilder`] picks a strategy from that capability and
//! the [`ArchivePlan`]:
//!
//! - **Direct**: one compressed archive in a single pass.
//! - **Incremental**: uncompressed base archive of the direct partition, one append
//!   per hardlinked file, then a single compression step. Appending after
//!   compression would require recompressing per file, so compression is last.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, error, info};

use crate::contract::Archiver;
use crate::error::{UploadError, UploadResult};
use crate::hardlinks::ArchivePlan;

pub const ARCHIVE_NAME: &str = "config.tar";
pub const DIRECT_LISTING: &str = "files.list";

/// Which build path the builder took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStrategy {
    Direct,
    Incremental,
}

impl ArchiveStrategy {
    pub fn choose(supports_dereference: bool, plan: &ArchivePlan) -> Self {
        if supports_dereference || plan.is_trivial() {
            ArchiveStrategy::Direct
        } else {
            ArchiveStrategy::Incremental
        }
    }
}

/// A finished, compressed archive inside the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArchive {
    pub path: PathBuf,
    pub strategy: ArchiveStrategy,
    pub file_count: usize,
}

/// Builds one compressed archive from a plan.
pub struct ArchiveBuilder<'a, A: Archiver + ?Sized> {
    archiver: &'a A,
    root: &'a Path,
    staging: &'a Path,
}

impl<'a, A: Archiver + ?Sized> ArchiveBuilder<'a, A> {
    /// `staging` receives the archive and listing files; it must be owned by this invocation.
    pub fn new(archiver: &'a A, root: &'a Path, staging: &'a Path) -> Self {
        Self {
            archiver,
            root,
            staging,
        }
    }

    pub fn build(&self, plan: &ArchivePlan) -> UploadResult<BuiltArchive> {
        if plan.is_empty() {
            return Err(UploadError::ArchiveBuildFailed(
                "no files selected for the archive".into(),
            ));
        }

        let strategy = ArchiveStrategy::choose(self.archiver.supports_hardlink_dereference(), plan);
        info!(
            archiver = self.archiver.name(),
            ?strategy,
            files = plan.len(),
            "[ARCHIVE] Building archive"
        );

        let path = match strategy {
            ArchiveStrategy::Direct => self.build_direct(plan)?,
            ArchiveStrategy::Incremental => self.build_incremental(plan)?,
        };

        info!(path = %path.display(), "[ARCHIVE] Archive built");
        Ok(BuiltArchive {
            path,
            strategy,
            file_count: plan.len(),
        })
    }

    fn build_direct(&self, plan: &ArchivePlan) -> UploadResult<PathBuf> {
        let listing = self.staging.join(DIRECT_LISTING);
        plan.files()
            .write_listing(&listing)
            .map_err(|e| UploadError::archive("write file listing", e))?;

        let dest = self.staging.join(format!("{ARCHIVE_NAME}.gz"));
        self.archiver.create_compressed(self.root, &listing, &dest)?;
        Ok(dest)
    }

    fn build_incremental(&self, plan: &ArchivePlan) -> UploadResult<PathBuf> {
        let listing = self.staging.join(DIRECT_LISTING);
        plan.direct
            .write_listing(&listing)
            .map_err(|e| UploadError::archive("write file listing", e))?;

        let tarball = self.staging.join(ARCHIVE_NAME);
        self.archiver.create(self.root, &listing, &tarball)?;
        debug!(files = plan.direct.len(), "[ARCHIVE] Base archive created");

        for file in plan.hardlinked.iter() {
            debug!(path = %file.display(), "[ARCHIVE] Appending hardlinked file");
            self.archiver.append(self.root, file, &tarball)?;
        }

        self.archiver.compress(&tarball)
    }
}

/// GNU tar: dereferences hardlinks natively.
#[derive(Debug, Clone)]
pub struct GnuTar {
    tar: PathBuf,
    gzip: PathBuf,
}

impl GnuTar {
    pub fn new(tar: impl Into<PathBuf>, gzip: impl Into<PathBuf>) -> Self {
        Self {
            tar: tar.into(),
            gzip: gzip.into(),
        }
    }
}

impl Archiver for GnuTar {
    fn name(&self) -> &'static str {
        "gnu-tar"
    }

    fn supports_hardlink_dereference(&self) -> bool {
        true
    }

    fn create_compressed(&self, root: &Path, listing: &Path, dest: &Path) -> UploadResult<()> {
        let mut cmd = Command::new(&self.tar);
        cmd.arg("--hard-dereference").arg("-czf").arg(dest);
        with_listing(&mut cmd, root, listing, true);
        run_tool(cmd, "tar create")
    }

    fn create(&self, root: &Path, listing: &Path, dest: &Path) -> UploadResult<()> {
        tar_create(&self.tar, root, listing, dest, true)
    }

    fn append(&self, root: &Path, file: &Path, dest: &Path) -> UploadResult<()> {
        tar_append(&self.tar, root, file, dest, true)
    }

    fn compress(&self, archive: &Path) -> UploadResult<PathBuf> {
        gzip(&self.gzip, archive)
    }
}

/// BSD tar (libarchive): stores hardlinks as link records, so hardlinked files
/// are appended one at a time instead.
///
/// The binary may still be GNU tar when this backend is forced; member names
/// then need GNU's verbatim-name flags, so the binary is checked once here.
#[derive(Debug, Clone)]
pub struct BsdTar {
    tar: PathBuf,
    gzip: PathBuf,
    gnu_names: bool,
}

impl BsdTar {
    pub fn new(tar: impl Into<PathBuf>, gzip: impl Into<PathBuf>) -> Self {
        let tar = tar.into();
        let gnu_names = is_gnu_tar(&tar);
        Self {
            tar,
            gzip: gzip.into(),
            gnu_names,
        }
    }
}

impl Archiver for BsdTar {
    fn name(&self) -> &'static str {
        "bsd-tar"
    }

    fn supports_hardlink_dereference(&self) -> bool {
        false
    }

    fn create_compressed(&self, root: &Path, listing: &Path, dest: &Path) -> UploadResult<()> {
        let mut cmd = Command::new(&self.tar);
        cmd.arg("-czf").arg(dest);
        with_listing(&mut cmd, root, listing, self.gnu_names);
        run_tool(cmd, "tar create")
    }

    fn create(&self, root: &Path, listing: &Path, dest: &Path) -> UploadResult<()> {
        tar_create(&self.tar, root, listing, dest, self.gnu_names)
    }

    fn append(&self, root: &Path, file: &Path, dest: &Path) -> UploadResult<()> {
        tar_append(&self.tar, root, file, dest, self.gnu_names)
    }

    fn compress(&self, archive: &Path) -> UploadResult<PathBuf> {
        gzip(&self.gzip, archive)
    }
}

/// True if `tar --version` identifies GNU tar.
pub fn is_gnu_tar(tar: &Path) -> bool {
    match Command::new(tar).arg("--version").output() {
        Ok(out) => String::from_utf8_lossy(&out.stdout).contains("GNU tar"),
        Err(e) => {
            error!(error = ?e, tar = %tar.display(), "Failed to launch tar --version");
            false
        }
    }
}

/// `-C root` followed by the flags that keep member names verbatim. GNU tar
/// unquotes backslash escapes in names by default.
fn rooted_names(cmd: &mut Command, root: &Path, gnu: bool) {
    cmd.arg("-C").arg(root);
    if gnu {
        cmd.arg("--no-unquote");
    }
}

/// Read member names from a NUL-terminated listing; a name starting with `-`
/// is never taken for an option.
fn with_listing(cmd: &mut Command, root: &Path, listing: &Path, gnu: bool) {
    rooted_names(cmd, root, gnu);
    cmd.arg("--null");
    if gnu {
        cmd.arg("--verbatim-files-from");
    }
    cmd.arg("-T").arg(listing);
}

fn tar_create(tar: &Path, root: &Path, listing: &Path, dest: &Path, gnu: bool) -> UploadResult<()> {
    let mut cmd = Command::new(tar);
    cmd.arg("-cf").arg(dest);
    with_listing(&mut cmd, root, listing, gnu);
    run_tool(cmd, "tar create")
}

fn tar_append(tar: &Path, root: &Path, file: &Path, dest: &Path, gnu: bool) -> UploadResult<()> {
    let mut cmd = Command::new(tar);
    cmd.arg("-rf").arg(dest);
    rooted_names(&mut cmd, root, gnu);
    cmd.arg("--").arg(file);
    run_tool(cmd, &format!("tar append {}", file.display()))
}

fn gzip(gzip: &Path, archive: &Path) -> UploadResult<PathBuf> {
    let mut cmd = Command::new(gzip);
    cmd.arg("-f").arg("--").arg(archive);
    run_tool(cmd, "gzip")?;

    let mut compressed = archive.as_os_str().to_owned();
    compressed.push(".gz");
    let compressed = PathBuf::from(compressed);
    if !compressed.is_file() {
        return Err(UploadError::ArchiveBuildFailed(format!(
            "gzip did not produce {}",
            compressed.display()
        )));
    }
    Ok(compressed)
}

fn run_tool(mut cmd: Command, step: &str) -> UploadResult<()> {
    debug!(command = ?cmd, "[ARCHIVE] Running");
    let out = cmd.output().map_err(|e| {
        error!(error = ?e, step, "Failed to launch archiver process");
        UploadError::archive(format!("launch {step}"), e)
    })?;
    if out.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&out.stderr);
    let first_line = stderr.lines().next().unwrap_or("").trim();
    error!(step, status = %out.status, stderr = %stderr, "Archiver exited with non-zero code");
    Err(UploadError::ArchiveBuildFailed(format!(
        "{step} exited with {}: {first_line}",
        out.status
    )))
}
