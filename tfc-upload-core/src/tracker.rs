//! Run tracking: resolve the run created for a configuration version, then
//! optionally poll it to a terminal status.
//!
//! # Resolution
//! The run listing is filtered client-side for the new configuration version.
//! At most [`RESOLVE_ATTEMPTS`] listings are made with [`RESOLVE_DELAY`] between
//! them; the first match wins.
//!
//! # Polling
//! Each iteration reads and prints the run status. A terminal status ends the
//! loop. Otherwise the workspace lock is read: if another party holds it, the
//! owner is printed and `skip_next_delay` is set, so the next iteration re-reads
//! the status immediately, prints it and returns [`PollOutcome::LockedByOther`].
//! If that re-read fails, the status seen before the lock was read is reported
//! instead; contention is still the outcome. Without contention the loop sleeps
//! for the configured interval.

use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::contract::{Run, RunStatus, Sleeper, WorkspaceApi};
use crate::error::{UploadError, UploadResult};

pub const RESOLVE_ATTEMPTS: u32 = 10;
pub const RESOLVE_DELAY: Duration = Duration::from_secs(1);

/// How polling ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Polling was disabled (interval zero).
    NotPolled,
    /// The run reached a terminal status.
    Finished { status: RunStatus },
    /// Another party holds the workspace lock.
    LockedByOther { owner: String, status: RunStatus },
}

/// A resolved run together with how tracking ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRun {
    pub run: Run,
    pub outcome: PollOutcome,
    /// Status reads performed while polling.
    pub polls: u32,
}

#[derive(Debug, Default)]
struct PollState {
    skip_next_delay: bool,
    lock_owner: Option<String>,
    last_status: Option<RunStatus>,
    polls: u32,
}

pub struct RunTracker<'a, A: WorkspaceApi + ?Sized, S: Sleeper + ?Sized> {
    api: &'a A,
    sleeper: &'a S,
    workspace_id: &'a str,
}

impl<'a, A: WorkspaceApi + ?Sized, S: Sleeper + ?Sized> RunTracker<'a, A, S> {
    pub fn new(api: &'a A, sleeper: &'a S, workspace_id: &'a str) -> Self {
        Self {
            api,
            sleeper,
            workspace_id,
        }
    }

    /// Resolve the run and, when `poll_interval` is non-zero, follow it.
    pub async fn track(
        &self,
        configuration_version_id: &str,
        poll_interval: Duration,
    ) -> UploadResult<TrackedRun> {
        let run = self.resolve_run(configuration_version_id).await?;
        println!("Run {} created ({})", run.id, run.status);

        if poll_interval.is_zero() {
            debug!(run_id = %run.id, "[RUN] Polling disabled");
            return Ok(TrackedRun {
                run,
                outcome: PollOutcome::NotPolled,
                polls: 0,
            });
        }

        let (outcome, polls) = self.poll(&run.id, poll_interval).await?;
        Ok(TrackedRun {
            run,
            outcome,
            polls,
        })
    }

    pub async fn resolve_run(&self, configuration_version_id: &str) -> UploadResult<Run> {
        for attempt in 1..=RESOLVE_ATTEMPTS {
            debug!(attempt, configuration_version_id, "[RUN] Looking up run");
            let runs = self.api.list_runs(self.workspace_id).await?;
            if let Some(run) = runs
                .into_iter()
                .find(|r| r.configuration_version_id.as_deref() == Some(configuration_version_id))
            {
                info!(run_id = %run.id, attempt, "[RUN] Resolved run");
                return Ok(run);
            }
            if attempt < RESOLVE_ATTEMPTS {
                self.sleeper.sleep(RESOLVE_DELAY).await;
            }
        }

        error!(configuration_version_id, "[RUN][ERROR] Run did not appear in time");
        Err(UploadError::RunResolutionTimeout {
            configuration_version_id: configuration_version_id.to_string(),
            attempts: RESOLVE_ATTEMPTS,
        })
    }

    /// Poll until the run leaves the active set or another party takes the lock.
    pub async fn poll(&self, run_id: &str, interval: Duration) -> UploadResult<(PollOutcome, u32)> {
        let mut state = PollState::default();

        loop {
            let read = self.api.get_run(run_id).await;

            if state.skip_next_delay {
                let status = match read {
                    Ok(run) => {
                        state.polls += 1;
                        println!("Run {} status: {}", run_id, run.status);
                        run.status
                    }
                    Err(e) => {
                        warn!(run_id, error = %e, "[RUN] Status re-read failed, reporting last known status");
                        state.last_status.take().unwrap_or(RunStatus::Pending)
                    }
                };
                let owner = state.lock_owner.take().unwrap_or_default();
                info!(run_id, %owner, %status, "[RUN] Stopping, workspace locked by another owner");
                return Ok((PollOutcome::LockedByOther { owner, status }, state.polls));
            }

            let run = read.map_err(polling_failed)?;
            state.polls += 1;
            println!("Run {} status: {}", run_id, run.status);

            if !run.status.is_active() {
                info!(run_id, status = %run.status, "[RUN] Run reached terminal status");
                return Ok((PollOutcome::Finished { status: run.status }, state.polls));
            }

            let lock = self
                .api
                .workspace_lock(self.workspace_id)
                .await
                .map_err(polling_failed)?;
            if let Some(owner) = lock.locked_by_other(run_id) {
                println!("Workspace locked by {owner}");
                state.lock_owner = Some(owner.to_string());
                state.last_status = Some(run.status);
                state.skip_next_delay = true;
                continue;
            }

            self.sleeper.sleep(interval).await;
        }
    }
}

fn polling_failed(e: UploadError) -> UploadError {
    error!(error = %e, "[RUN][ERROR] Polling failed");
    match e {
        UploadError::PollingFailed(msg) => UploadError::PollingFailed(msg),
        other => UploadError::PollingFailed(other.to_string()),
    }
}
