// tests/coordinator_lifecycle.rs

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use testctl::coordinator::{CoordinatorOptions, RunCoordinator, RunSettings, RunState};
use testctl::primary::{is_primary_context, primary_context};
use testctl::unit::UnitOutcome;
use testctl_test_utils::fake_bridge::RecordingBridge;
use testctl_test_utils::fake_unit::Journal;
use testctl_test_utils::{Harness, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test]
async fn empty_run_set_still_completes_once() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());

    let handle = h.coordinator.run_test_array(Vec::new(), Some(h.callback()))?;
    let report = with_timeout(handle.report()).await?;

    assert!(report.results.is_empty());
    assert_eq!(h.journal.events(), vec!["callback", "finished:1"]);
    assert_eq!(h.bridge.finished(), vec![1]);
    assert_eq!(h.coordinator.state(), RunState::Idle);

    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn only_the_focused_supported_unit_runs() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());
    assert_eq!(h.coordinator.default_timeout(), Duration::from_secs(5));

    let units = vec![
        h.unit("unsupported").unsupported().build(),
        h.unit("focused").focused().build(),
        h.unit("unfocused").build(),
    ];

    let report = with_timeout(h.coordinator.run_test_array(units, None)?.report()).await?;

    assert_eq!(report.executed(), vec!["focused"]);
    assert_eq!(report.skipped_unsupported, 1);
    assert_eq!(report.skipped_unfocused, 1);
    assert!(report.focus_applied);
    assert_eq!(h.journal.executed(), vec!["focused"]);

    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn focused_but_unsupported_unit_does_not_exclude_others() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());

    let units = vec![
        h.unit("focused-elsewhere").unsupported().focused().build(),
        h.unit("a").build(),
        h.unit("b").build(),
    ];

    let report = with_timeout(h.coordinator.run_test_array(units, None)?.report()).await?;

    assert_eq!(report.executed(), vec!["a", "b"]);
    assert!(!report.focus_applied);

    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn callback_follows_last_unit_and_bridge_follows_callback() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());

    let units = vec![
        h.unit("a").build(),
        h.unit("b").sleeps(Duration::from_millis(20)).build(),
    ];

    let handle = h.coordinator.run_test_array(units, Some(h.callback()))?;
    with_timeout(handle.report()).await?;

    assert_eq!(
        h.journal.events(),
        vec!["start:1:a", "end:1:a", "start:1:b", "end:1:b", "callback", "finished:1"]
    );
    assert_eq!(h.bridge.off_primary_calls(), 0);

    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn failing_and_panicking_units_do_not_stop_the_run() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());

    let units = vec![
        h.unit("fails").fails("assertion failed: button visible").build(),
        h.unit("panics").panics("unexpected nil element").build(),
        h.unit("passes").build(),
    ];

    let handle = h.coordinator.run_test_array(units, Some(h.callback()))?;
    let report = with_timeout(handle.report()).await?;

    assert_eq!(report.executed(), vec!["fails", "panics", "passes"]);
    assert_eq!(
        report.results[0].outcome,
        UnitOutcome::Failed("assertion failed: button visible".to_string())
    );
    assert_eq!(
        report.results[1].outcome,
        UnitOutcome::Panicked("unexpected nil element".to_string())
    );
    assert_eq!(report.results[2].outcome, UnitOutcome::Passed);
    assert_eq!(report.failed(), 2);

    let events = h.journal.events();
    assert_eq!(events.iter().filter(|e| *e == "callback").count(), 1);
    assert_eq!(h.bridge.finished(), vec![1]);

    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn units_run_one_at_a_time() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());

    let units = (0..5)
        .map(|i| h.unit(&format!("u{i}")).sleeps(Duration::from_millis(5)).build())
        .collect();

    with_timeout(h.coordinator.run_test_array(units, None)?.report()).await?;

    assert_eq!(h.journal.executed().len(), 5);
    assert_eq!(h.journal.max_concurrency(), 1);

    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn sets_collapse_duplicates_and_arrays_keep_them() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());

    let set: HashSet<_> = [h.unit("same").build(), h.unit("same").build()]
        .into_iter()
        .collect();
    let report = with_timeout(h.coordinator.run_test_set(set, None)?.report()).await?;
    assert_eq!(report.executed(), vec!["same"]);

    let array = vec![h.unit("same").build(), h.unit("same").build()];
    let report = with_timeout(h.coordinator.run_test_array(array, None)?.report()).await?;
    assert_eq!(report.executed(), vec!["same", "same"]);
    assert_eq!(report.run_id, 2);

    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn units_see_the_configured_default_timeout() -> TestResult {
    init_tracing();
    let options = CoordinatorOptions {
        settings: RunSettings {
            default_timeout: Duration::from_millis(750),
            should_wait_for_debugger: false,
        },
        ..Default::default()
    };
    let h = Harness::start(options);

    with_timeout(h.coordinator.run_test_array(vec![h.unit("a").build()], None)?.report()).await?;

    h.coordinator.set_default_timeout(Duration::from_secs(2))?;
    with_timeout(h.coordinator.run_test_array(vec![h.unit("b").build()], None)?.report()).await?;

    assert_eq!(
        h.journal.timeouts(),
        vec![Duration::from_millis(750), Duration::from_secs(2)]
    );

    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn state_watch_ends_idle_after_each_run() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());
    let states = h.coordinator.subscribe();
    assert_eq!(*states.borrow(), RunState::Idle);

    let handle = h.coordinator.run_test_array(vec![h.unit("a").build()], None)?;
    assert_eq!(handle.run_id(), 1);
    with_timeout(handle.report()).await?;

    assert_eq!(*states.borrow(), RunState::Idle);

    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn run_completes_when_primary_loop_is_gone() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());
    h.primary.stop()?;

    // Give the loop a chance to observe the stop request.
    tokio::task::yield_now().await;
    with_timeout(async {
        while !h.primary.is_closed() {
            tokio::task::yield_now().await;
        }
    })
    .await;

    let handle = h.coordinator.run_test_array(vec![h.unit("a").build()], Some(h.callback()))?;
    let report = with_timeout(handle.report()).await?;

    assert_eq!(report.executed(), vec!["a"]);
    assert_eq!(h.bridge.finished(), vec![1]);
    assert_eq!(h.coordinator.state(), RunState::Idle);
    assert!(h.journal.events().contains(&"callback(off-primary)".to_string()));

    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn panicking_callback_still_returns_coordinator_to_idle() -> TestResult {
    init_tracing();
    let h = Harness::start(CoordinatorOptions::default());

    let handle = h
        .coordinator
        .run_test_array(Vec::new(), Some(Box::new(|| panic!("callback bug"))))?;
    let report = with_timeout(handle.report()).await?;

    assert_eq!(report.run_id, 1);
    assert_eq!(h.bridge.finished(), vec![1]);
    assert_eq!(h.coordinator.state(), RunState::Idle);

    // The primary loop survived and the next run is accepted.
    let handle = h.coordinator.run_test_array(vec![h.unit("a").build()], Some(h.callback()))?;
    let report = with_timeout(handle.report()).await?;

    assert_eq!(report.executed(), vec!["a"]);
    assert_eq!(h.bridge.finished(), vec![1, 2]);
    assert!(h.journal.events().contains(&"callback".to_string()));

    h.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn completion_queued_behind_stop_still_runs() -> TestResult {
    init_tracing();
    let journal = Journal::default();
    let bridge = Arc::new(RecordingBridge::new(journal.clone()));
    let (primary, primary_loop) = primary_context();
    let coordinator =
        RunCoordinator::new(CoordinatorOptions::default(), primary.clone(), bridge.clone());
    let mut states = coordinator.subscribe();

    primary.stop()?;
    let cb_journal = journal.clone();
    let handle = coordinator.run_test_array(
        Vec::new(),
        Some(Box::new(move || {
            cb_journal.push(format!("callback(primary={})", is_primary_context()))
        })),
    )?;

    // The completion job is queued behind the stop request.
    with_timeout(states.wait_for(|s| *s == RunState::Completed)).await?;
    assert!(bridge.finished().is_empty());

    primary_loop.run().await;
    let report = with_timeout(handle.report()).await?;

    assert_eq!(report.run_id, 1);
    assert_eq!(journal.events(), vec!["callback(primary=true)", "finished:1"]);
    assert_eq!(coordinator.state(), RunState::Idle);
    assert!(primary.is_closed());
    Ok(())
}
