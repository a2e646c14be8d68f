use std::collections::VecDeque;
use std::time::Duration;

use tfc_upload_core::contract::{
    MockSleeper, MockWorkspaceApi, Run, RunStatus, WorkspaceLockState,
};
use tfc_upload_core::error::UploadError;
use tfc_upload_core::tracker::{PollOutcome, RunTracker, RESOLVE_ATTEMPTS, RESOLVE_DELAY};

const WS: &str = "ws-abc";
const CV: &str = "cv-new";
const RUN: &str = "run-new";
const INTERVAL: Duration = Duration::from_secs(5);

fn run(id: &str, status: &str, cv: Option<&str>) -> Run {
    Run {
        id: id.to_string(),
        status: RunStatus::from(status),
        configuration_version_id: cv.map(str::to_string),
    }
}

fn unlocked() -> WorkspaceLockState {
    WorkspaceLockState::default()
}

/// Listing that already contains the new run on the first attempt.
fn resolvable(api: &mut MockWorkspaceApi) {
    api.expect_list_runs()
        .withf(|ws| ws == WS)
        .times(1)
        .returning(|_| Ok(vec![run(RUN, "pending", Some(CV))]));
}

/// `get_run` answers with the given statuses, in order.
fn statuses(api: &mut MockWorkspaceApi, seq: &[&'static str]) {
    let mut queue: VecDeque<&'static str> = seq.iter().copied().collect();
    api.expect_get_run()
        .withf(|id| id == RUN)
        .times(seq.len())
        .returning(move |_| Ok(run(RUN, queue.pop_front().unwrap(), Some(CV))));
}

#[tokio::test]
async fn test_resolution_times_out_after_bounded_attempts() {
    let mut api = MockWorkspaceApi::new();
    api.expect_list_runs()
        .times(RESOLVE_ATTEMPTS as usize)
        .returning(|_| Ok(vec![run("run-old", "applied", Some("cv-old"))]));
    api.expect_get_run().never();

    let mut sleeper = MockSleeper::new();
    sleeper
        .expect_sleep()
        .withf(|d| *d == RESOLVE_DELAY)
        .times(RESOLVE_ATTEMPTS as usize - 1)
        .returning(|_| ());

    let err = RunTracker::new(&api, &sleeper, WS)
        .track(CV, INTERVAL)
        .await
        .unwrap_err();
    match err {
        UploadError::RunResolutionTimeout {
            configuration_version_id,
            attempts,
        } => {
            assert_eq!(configuration_version_id, CV);
            assert_eq!(attempts, RESOLVE_ATTEMPTS);
        }
        other => panic!("expected RunResolutionTimeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resolution_takes_first_matching_run() {
    let mut api = MockWorkspaceApi::new();
    api.expect_list_runs().times(1).returning(|_| {
        Ok(vec![
            run("run-other", "applied", Some("cv-other")),
            run("run-unlinked", "pending", None),
            run("run-first", "planning", Some(CV)),
            run("run-second", "pending", Some(CV)),
        ])
    });
    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().never();

    let resolved = RunTracker::new(&api, &sleeper, WS)
        .resolve_run(CV)
        .await
        .unwrap();
    assert_eq!(resolved.id, "run-first");
    assert_eq!(resolved.status, RunStatus::Planning);
}

#[tokio::test]
async fn test_resolution_waits_between_listings_until_run_appears() {
    let mut api = MockWorkspaceApi::new();
    let mut listings: VecDeque<Vec<Run>> = VecDeque::from(vec![
        vec![],
        vec![run("run-old", "applied", Some("cv-old"))],
        vec![run(RUN, "pending", Some(CV))],
    ]);
    api.expect_list_runs()
        .times(3)
        .returning(move |_| Ok(listings.pop_front().unwrap()));

    let mut sleeper = MockSleeper::new();
    sleeper
        .expect_sleep()
        .withf(|d| *d == RESOLVE_DELAY)
        .times(2)
        .returning(|_| ());

    let resolved = RunTracker::new(&api, &sleeper, WS)
        .resolve_run(CV)
        .await
        .unwrap();
    assert_eq!(resolved.id, RUN);
}

#[tokio::test]
async fn test_listing_error_aborts_resolution() {
    let mut api = MockWorkspaceApi::new();
    api.expect_list_runs()
        .times(1)
        .returning(|_| Err(UploadError::ApiRequestFailed("HTTP 503".into())));
    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().never();

    let err = RunTracker::new(&api, &sleeper, WS)
        .resolve_run(CV)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::ApiRequestFailed(_)));
}

#[tokio::test]
async fn test_zero_interval_reports_without_polling() {
    let mut api = MockWorkspaceApi::new();
    resolvable(&mut api);
    api.expect_get_run().never();
    api.expect_workspace_lock().never();
    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().never();

    let tracked = RunTracker::new(&api, &sleeper, WS)
        .track(CV, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(tracked.outcome, PollOutcome::NotPolled);
    assert_eq!(tracked.polls, 0);
    assert_eq!(tracked.run.id, RUN);
}

#[tokio::test]
async fn test_polling_sleeps_once_per_active_status() {
    let mut api = MockWorkspaceApi::new();
    resolvable(&mut api);
    statuses(&mut api, &["pending", "planning", "confirmed", "errored"]);
    api.expect_workspace_lock()
        .withf(|ws| ws == WS)
        .times(3)
        .returning(|_| Ok(unlocked()));

    let mut sleeper = MockSleeper::new();
    sleeper
        .expect_sleep()
        .withf(|d| *d == INTERVAL)
        .times(3)
        .returning(|_| ());

    let tracked = RunTracker::new(&api, &sleeper, WS)
        .track(CV, INTERVAL)
        .await
        .unwrap();
    assert_eq!(
        tracked.outcome,
        PollOutcome::Finished {
            status: RunStatus::Errored
        }
    );
    assert_eq!(tracked.polls, 4);
}

#[tokio::test]
async fn test_lock_by_other_owner_stops_after_one_immediate_reread() {
    let mut api = MockWorkspaceApi::new();
    resolvable(&mut api);
    statuses(&mut api, &["pending", "pending"]);
    api.expect_workspace_lock().times(1).returning(|_| {
        Ok(WorkspaceLockState {
            locked: true,
            lock_owner_id: Some("user-ops".into()),
        })
    });

    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().never();

    let tracked = RunTracker::new(&api, &sleeper, WS)
        .track(CV, INTERVAL)
        .await
        .unwrap();
    assert_eq!(
        tracked.outcome,
        PollOutcome::LockedByOther {
            owner: "user-ops".into(),
            status: RunStatus::Pending,
        }
    );
    assert_eq!(tracked.polls, 2);
}

#[tokio::test]
async fn test_failed_reread_after_contention_still_reports_lock() {
    let mut api = MockWorkspaceApi::new();
    resolvable(&mut api);
    let mut reads = 0;
    api.expect_get_run().times(2).returning(move |_| {
        reads += 1;
        if reads == 1 {
            Ok(run(RUN, "planning", Some(CV)))
        } else {
            Err(UploadError::ApiRequestFailed("HTTP 502".into()))
        }
    });
    api.expect_workspace_lock().times(1).returning(|_| {
        Ok(WorkspaceLockState {
            locked: true,
            lock_owner_id: Some("user-ops".into()),
        })
    });

    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().never();

    let tracked = RunTracker::new(&api, &sleeper, WS)
        .track(CV, INTERVAL)
        .await
        .unwrap();
    assert_eq!(
        tracked.outcome,
        PollOutcome::LockedByOther {
            owner: "user-ops".into(),
            status: RunStatus::Planning,
        }
    );
    assert_eq!(tracked.polls, 1);
}

#[tokio::test]
async fn test_lock_held_by_tracked_run_keeps_polling() {
    let mut api = MockWorkspaceApi::new();
    resolvable(&mut api);
    statuses(&mut api, &["planning", "applying", "applied"]);
    api.expect_workspace_lock().times(2).returning(|_| {
        Ok(WorkspaceLockState {
            locked: true,
            lock_owner_id: Some(RUN.into()),
        })
    });

    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().times(2).returning(|_| ());

    let tracked = RunTracker::new(&api, &sleeper, WS)
        .track(CV, INTERVAL)
        .await
        .unwrap();
    assert_eq!(
        tracked.outcome,
        PollOutcome::Finished {
            status: RunStatus::Applied
        }
    );
}

#[tokio::test]
async fn test_lock_without_owner_is_not_contention() {
    let mut api = MockWorkspaceApi::new();
    resolvable(&mut api);
    statuses(&mut api, &["pending", "planned"]);
    api.expect_workspace_lock().times(1).returning(|_| {
        Ok(WorkspaceLockState {
            locked: true,
            lock_owner_id: None,
        })
    });
    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().times(1).returning(|_| ());

    let tracked = RunTracker::new(&api, &sleeper, WS)
        .track(CV, INTERVAL)
        .await
        .unwrap();
    assert!(matches!(tracked.outcome, PollOutcome::Finished { .. }));
}

#[tokio::test]
async fn test_status_read_failure_is_polling_failed() {
    let mut api = MockWorkspaceApi::new();
    resolvable(&mut api);
    api.expect_get_run()
        .times(1)
        .returning(|_| Err(UploadError::ApiRequestFailed("HTTP 500".into())));
    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().never();

    let err = RunTracker::new(&api, &sleeper, WS)
        .track(CV, INTERVAL)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::PollingFailed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_lock_read_failure_is_polling_failed() {
    let mut api = MockWorkspaceApi::new();
    resolvable(&mut api);
    statuses(&mut api, &["pending"]);
    api.expect_workspace_lock()
        .times(1)
        .returning(|_| Err(UploadError::MalformedResponse("missing data".into())));
    let mut sleeper = MockSleeper::new();
    sleeper.expect_sleep().never();

    let err = RunTracker::new(&api, &sleeper, WS)
        .track(CV, INTERVAL)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::PollingFailed(_)));
}
