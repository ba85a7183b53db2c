// tests/single_flight.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use testctl::coordinator::{CoordinatorOptions, RunState};
use testctl::errors::TestCtlError;
use testctl_test_utils::{Harness, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test]
async fn second_request_is_rejected_while_running() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());
    let release = Arc::new(AtomicBool::new(false));

    let first = h.coordinator.run_test_array(
        vec![
            h.unit("blocking")
                .waits_for(release.clone(), Some(Duration::from_secs(30)))
                .build(),
        ],
        Some(h.callback()),
    )?;

    let mut states = h.coordinator.subscribe();
    with_timeout(states.wait_for(|s| *s == RunState::Running)).await?;

    let err = h
        .coordinator
        .run_test_array(vec![h.unit("intruder").build()], Some(h.callback()))
        .unwrap_err();
    assert!(matches!(err, TestCtlError::SchedulingConflict(RunState::Running)));

    release.store(true, Ordering::SeqCst);
    let report = with_timeout(first.report()).await?;
    assert_eq!(report.executed(), vec!["blocking"]);

    // The rejected request never ran and never reported.
    assert!(!h.journal.executed().contains(&"intruder".to_string()));
    assert_eq!(h.bridge.finished(), vec![1]);
    assert_eq!(
        h.journal.events().iter().filter(|e| *e == "callback").count(),
        1
    );

    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn request_is_rejected_right_after_acceptance() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());

    let first = h.coordinator.run_test_array(vec![h.unit("a").build()], None)?;

    // Nothing has yielded yet, so the first run is still scheduled.
    let err = h.coordinator.run_test_array(vec![], None).unwrap_err();
    assert!(matches!(err, TestCtlError::SchedulingConflict(RunState::Scheduled)));

    with_timeout(first.report()).await?;
    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn consecutive_runs_never_interleave() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());

    for round in 1..=3u64 {
        let units = vec![
            h.unit("x").sleeps(Duration::from_millis(3)).build(),
            h.unit("y").sleeps(Duration::from_millis(3)).build(),
        ];
        let report = with_timeout(h.coordinator.run_test_array(units, None)?.report()).await?;
        assert_eq!(report.run_id, round);
    }

    let events = h.journal.events();
    let mut expected = Vec::new();
    for round in 1..=3 {
        for name in ["x", "y"] {
            expected.push(format!("start:{round}:{name}"));
            expected.push(format!("end:{round}:{name}"));
        }
        expected.push(format!("finished:{round}"));
    }
    assert_eq!(events, expected);
    assert_eq!(h.journal.max_concurrency(), 1);

    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn settings_are_locked_while_a_run_is_active() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());
    let release = Arc::new(AtomicBool::new(false));

    let handle = h.coordinator.run_test_array(
        vec![h.unit("a").waits_for(release.clone(), Some(Duration::from_secs(30))).build()],
        None,
    )?;

    let err = h
        .coordinator
        .set_default_timeout(Duration::from_secs(1))
        .unwrap_err();
    assert!(matches!(err, TestCtlError::SettingsLocked(_)));
    assert!(h.coordinator.set_should_wait_for_debugger(true).is_err());
    assert_eq!(h.coordinator.default_timeout(), Duration::from_secs(5));

    release.store(true, Ordering::SeqCst);
    with_timeout(handle.report()).await?;

    h.coordinator.set_default_timeout(Duration::from_secs(1))?;
    assert_eq!(h.coordinator.default_timeout(), Duration::from_secs(1));

    h.shutdown().await;
    Ok(())
}
