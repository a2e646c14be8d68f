use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{error, info, warn};

use crate::contract::{ConfigurationVersion, WorkspaceApi};
use crate::error::{UploadError, UploadResult};

/// Per-invocation scratch directory holding the archive and listing files.
///
/// The directory name is unique, so concurrent invocations against the same root
/// never collide. Dropping the area deletes it, which covers every early-return
/// path; [`StagingArea::release`] does the same explicitly and reports failures.
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    pub fn create() -> UploadResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("tfc-upload-")
            .tempdir()
            .map_err(|e| UploadError::archive("create staging directory", e))?;
        info!(path = %dir.path().display(), "[UPLOAD] Staging directory created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the archive and every intermediate file.
    pub fn release(self) {
        let path: PathBuf = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => info!(path = %path.display(), "[UPLOAD] Released local artifacts"),
            Err(e) => warn!(path = %path.display(), error = ?e, "[UPLOAD] Failed to remove staging directory"),
        }
    }
}

/// Creates configuration versions and transfers archives to them.
pub struct ConfigUploader<'a, A: WorkspaceApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: WorkspaceApi + ?Sized> ConfigUploader<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    pub async fn create_configuration_version(
        &self,
        workspace_id: &str,
    ) -> UploadResult<ConfigurationVersion> {
        info!(workspace_id, "[UPLOAD] Creating configuration version");
        match self.api.create_configuration_version(workspace_id).await {
            Ok(cv) => {
                info!(configuration_version_id = %cv.id, "[UPLOAD] Configuration version created");
                Ok(cv)
            }
            Err(e) => {
                error!(error = %e, workspace_id, "[UPLOAD][ERROR] Configuration version creation failed");
                Err(e)
            }
        }
    }

    pub async fn upload_archive(
        &self,
        configuration_version: &ConfigurationVersion,
        archive: &Path,
    ) -> UploadResult<()> {
        info!(
            configuration_version_id = %configuration_version.id,
            archive = %archive.display(),
            "[UPLOAD] Uploading archive"
        );
        match self
            .api
            .upload_archive(&configuration_version.upload_url, archive)
            .await
        {
            Ok(()) => {
                info!("[UPLOAD] Archive upload succeeded");
                Ok(())
            }
            Err(UploadError::UploadFailed(msg)) => {
                error!(error = %msg, "[UPLOAD][ERROR] Archive upload failed");
                Err(UploadError::UploadFailed(msg))
            }
            Err(other) => {
                error!(error = %other, "[UPLOAD][ERROR] Archive upload failed");
                Err(UploadError::UploadFailed(other.to_string()))
            }
        }
    }

    /// Create a configuration version and upload `archive` to it, releasing the
    /// staging area whatever the outcome.
    pub async fn create_and_upload(
        &self,
        workspace_id: &str,
        archive: &Path,
        staging: StagingArea,
    ) -> UploadResult<ConfigurationVersion> {
        let result = async {
            let cv = self.create_configuration_version(workspace_id).await?;
            self.upload_archive(&cv, archive).await?;
            Ok::<_, UploadError>(cv)
        }
        .await;
        release_artifact(staging);
        result
    }
}

/// Delete the local archive and listing files.
pub fn release_artifact(staging: StagingArea) {
    staging.release();
}
