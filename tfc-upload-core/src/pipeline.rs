//! High-level pipeline: select → partition → archive → upload → track.
//!
//! # Responsibilities
//! - Fail-fast orchestration for one [`UploadConfig`]; the first failing stage aborts.
//! - Local artifacts live in a [`StagingArea`] that is released on every exit path.
//! - Logs every stage through `tracing`; never depends on that output.
//!
//! # Callable From
//! - The CLI crate with the HTTP client and real archiver.
//! - Tests with mocks for every seam in [`crate::contract`].

use std::path::Path;
use tracing::{error, info};

use crate::archive::{ArchiveBuilder, ArchiveStrategy};
use crate::config::{SelectionPolicy, UploadConfig};
use crate::contract::{Archiver, LinkCounter, Sleeper, WorkspaceApi};
use crate::error::UploadResult;
use crate::hardlinks::{plan_for, ArchivePlan};
use crate::select::{FileSet, FileSetSelector};
use crate::tracker::{RunTracker, TrackedRun};
use crate::upload::{ConfigUploader, StagingArea};
use crate::vcs::Git;

/// What an upload invocation did.
#[derive(Debug)]
pub struct UploadReport {
    pub workspace_id: String,
    pub configuration_version_id: String,
    pub file_count: usize,
    pub strategy: ArchiveStrategy,
    pub run: TrackedRun,
}

/// The selection and partition for a config, without touching the network.
#[derive(Debug)]
pub struct SelectionPreview {
    pub files: FileSet,
    pub plan: ArchivePlan,
    pub strategy: ArchiveStrategy,
}

/// External collaborators of one pipeline invocation.
pub struct Collaborators<'a, A, R, S, L>
where
    A: WorkspaceApi + ?Sized,
    R: Archiver + ?Sized,
    S: Sleeper + ?Sized,
    L: LinkCounter + ?Sized,
{
    pub api: &'a A,
    pub archiver: &'a R,
    pub sleeper: &'a S,
    pub links: &'a L,
    pub git: Git,
}

/// Select and partition files under `root` without building or uploading anything.
pub fn preview_selection<R, L>(
    root: &Path,
    policy: SelectionPolicy,
    archiver: &R,
    links: &L,
    git: Git,
) -> UploadResult<SelectionPreview>
where
    R: Archiver + ?Sized,
    L: LinkCounter + ?Sized,
{
    let files = FileSetSelector::new(root, policy).with_git(git).select()?;
    let supports = archiver.supports_hardlink_dereference();
    let plan = plan_for(root, files.clone(), supports, links)?;
    let strategy = ArchiveStrategy::choose(supports, &plan);
    Ok(SelectionPreview {
        files,
        plan,
        strategy,
    })
}

pub async fn upload_configuration<A, R, S, L>(
    config: &UploadConfig,
    deps: Collaborators<'_, A, R, S, L>,
) -> UploadResult<UploadReport>
where
    A: WorkspaceApi + ?Sized,
    R: Archiver + ?Sized,
    S: Sleeper + ?Sized,
    L: LinkCounter + ?Sized,
{
    info!("[UPLOAD] Starting configuration upload pipeline");
    config.trace_loaded();

    let workspace_id = deps
        .api
        .workspace_id(&config.organization, &config.workspace)
        .await
        .map_err(|e| {
            error!(error = %e, "[UPLOAD][ERROR] Workspace lookup failed");
            e
        })?;
    info!(%workspace_id, "[UPLOAD] Workspace resolved");

    let preview = preview_selection(
        config.root(),
        config.policy,
        deps.archiver,
        deps.links,
        deps.git,
    )?;

    let staging = StagingArea::create()?;
    let built = ArchiveBuilder::new(deps.archiver, config.root(), staging.path())
        .build(&preview.plan)?;

    let cv = ConfigUploader::new(deps.api)
        .create_and_upload(&workspace_id, &built.path, staging)
        .await?;

    let run = RunTracker::new(deps.api, deps.sleeper, &workspace_id)
        .track(&cv.id, config.poll_interval)
        .await?;

    info!(run_id = %run.run.id, outcome = ?run.outcome, "[UPLOAD] Pipeline complete");
    Ok(UploadReport {
        workspace_id,
        configuration_version_id: cv.id,
        file_count: built.file_count,
        strategy: built.strategy,
        run,
    })
}
