// src/coordinator/mod.rs

//! Run coordination.
//!
//! A [`RunCoordinator`] accepts collections of test units, filters them,
//! executes them one at a time on a dedicated background executor and reports
//! back on the primary context. At most one run is active at any time:
//! requests made while a run is in flight are rejected with
//! [`TestCtlError::SchedulingConflict`].
//!
//! - [`state`] holds the pure state machine that decides which transitions
//!   are legal.
//! - `executor` owns the background loop that runs each run set.
//! - [`report`] defines per-unit results, the run summary and the reporter
//!   hook.
//!
//! The coordinator is a cheap, cloneable handle. Construct it once at
//! startup and pass it to whoever needs to request runs.

use std::collections::HashSet;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::bridge::HostBridge;
use crate::errors::{Result, TestCtlError};
use crate::poll::DEFAULT_TIMEOUT;
use crate::primary::PrimaryContext;
use crate::types::BuildMode;
use crate::unit::{RunId, UnitContext, UnitRef, select_run_set};

mod executor;
pub mod report;
pub mod state;

pub use report::{RunReport, RunReporter, TracingReporter, UnitResult};
pub use state::{RunState, RunStateMachine};

use executor::{RunJob, panic_message, spawn_executor};

/// Callback invoked on the primary context once a run has completed.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Settings the host may change between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Timeout handed to every unit's poller unless the unit overrides it.
    pub default_timeout: Duration,
    /// Hold each run in `AwaitingDebugAck` until
    /// [`RunCoordinator::acknowledge_debugger`] is called. Only honoured in
    /// [`BuildMode::Debug`].
    pub should_wait_for_debugger: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            should_wait_for_debugger: false,
        }
    }
}

/// Construction-time options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatorOptions {
    pub build_mode: BuildMode,
    pub settings: RunSettings,
}

struct Shared {
    machine: RunStateMachine,
    settings: RunSettings,
    debug_ack: Option<oneshot::Sender<()>>,
}

pub(crate) struct Inner {
    shared: Mutex<Shared>,
    build_mode: BuildMode,
    runtime: Handle,
    primary: PrimaryContext,
    bridge: Arc<dyn HostBridge>,
    reporter: Arc<dyn RunReporter>,
    executor_tx: mpsc::UnboundedSender<RunJob>,
    state_tx: watch::Sender<RunState>,
}

/// Handle to the process-wide run coordinator.
#[derive(Clone)]
pub struct RunCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for RunCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.lock();
        f.debug_struct("RunCoordinator")
            .field("state", &shared.machine.state())
            .field("settings", &shared.settings)
            .field("build_mode", &self.inner.build_mode)
            .finish_non_exhaustive()
    }
}

impl RunCoordinator {
    /// Create the coordinator, reporting unit progress through `tracing`.
    ///
    /// Must be called from within a Tokio runtime; the background executor
    /// is spawned immediately.
    pub fn new(
        options: CoordinatorOptions,
        primary: PrimaryContext,
        bridge: Arc<dyn HostBridge>,
    ) -> Self {
        Self::with_reporter(options, primary, bridge, Arc::new(TracingReporter))
    }

    pub fn with_reporter(
        options: CoordinatorOptions,
        primary: PrimaryContext,
        bridge: Arc<dyn HostBridge>,
        reporter: Arc<dyn RunReporter>,
    ) -> Self {
        let runtime = Handle::current();
        let executor_tx = spawn_executor(&runtime);
        let (state_tx, _) = watch::channel(RunState::Idle);

        info!(
            build_mode = %options.build_mode,
            default_timeout = ?options.settings.default_timeout,
            wait_for_debugger = options.settings.should_wait_for_debugger,
            "run coordinator created"
        );

        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    machine: RunStateMachine::new(),
                    settings: options.settings,
                    debug_ack: None,
                }),
                build_mode: options.build_mode,
                runtime,
                primary,
                bridge,
                reporter,
                executor_tx,
                state_tx,
            }),
        }
    }

    /// Run a set of units. Duplicates were already collapsed by the set.
    pub fn run_test_set(
        &self,
        tests: HashSet<UnitRef>,
        completion: Option<CompletionCallback>,
    ) -> Result<RunHandle> {
        self.run(tests, completion)
    }

    /// Run an array of units. Duplicated entries run once per occurrence.
    pub fn run_test_array(
        &self,
        tests: Vec<UnitRef>,
        completion: Option<CompletionCallback>,
    ) -> Result<RunHandle> {
        self.run(tests, completion)
    }

    /// Request a run. Returns as soon as the run is accepted; it never waits
    /// for units to execute.
    ///
    /// Units are filtered by platform support, then by focus. The completion
    /// callback runs on the primary context after the last unit, followed by
    /// the bridge's `testing_finished` signal. An empty run set still goes
    /// through the whole lifecycle.
    pub fn run<I>(&self, tests: I, completion: Option<CompletionCallback>) -> Result<RunHandle>
    where
        I: IntoIterator<Item = UnitRef>,
    {
        let inner = &self.inner;

        let (run_id, settings, ack_rx) = {
            let mut shared = inner.lock();
            let gated = shared.settings.should_wait_for_debugger && inner.build_mode.is_debug();
            if shared.settings.should_wait_for_debugger && !gated {
                debug!(build_mode = %inner.build_mode, "wait_for_debugger ignored outside debug builds");
            }

            let run_id = shared.machine.begin(gated).inspect_err(|err| {
                warn!(error = %err, "run request rejected");
            })?;
            let state = shared.machine.state();
            inner.state_tx.send_replace(state);
            info!(run_id, from = %RunState::Idle, to = %state, "run state changed");

            let ack_rx = gated.then(|| {
                let (tx, rx) = oneshot::channel();
                shared.debug_ack = Some(tx);
                rx
            });
            (run_id, shared.settings, ack_rx)
        };

        let run_set = select_run_set(tests);
        info!(
            run_id,
            selected = run_set.len(),
            skipped_unsupported = run_set.skipped_unsupported(),
            skipped_unfocused = run_set.skipped_unfocused(),
            "run set selected"
        );

        let (report_tx, report_rx) = oneshot::channel();
        let job = RunJob {
            run_id,
            run_set,
            context: UnitContext::new(run_id, settings.default_timeout),
            completion,
            report_tx,
            coordinator: Arc::clone(inner),
        };

        match ack_rx {
            None => inner.dispatch(job),
            Some(ack_rx) => {
                inner.prompt_for_debugger(run_id);
                inner.runtime.spawn(async move {
                    if ack_rx.await.is_err() {
                        warn!(run_id, "debugger gate closed without acknowledgment; run abandoned");
                        return;
                    }
                    let coordinator = Arc::clone(&job.coordinator);
                    coordinator.dispatch(job);
                });
            }
        }

        Ok(RunHandle { run_id, report_rx })
    }

    /// Release a run held in `AwaitingDebugAck`.
    pub fn acknowledge_debugger(&self) -> Result<()> {
        let mut shared = self.inner.lock();
        let Some(run_id) = shared.machine.current_run() else {
            return Err(TestCtlError::NotAwaitingDebugAck);
        };
        if shared.machine.state() != RunState::AwaitingDebugAck {
            return Err(TestCtlError::NotAwaitingDebugAck);
        }
        let ack = shared
            .debug_ack
            .take()
            .ok_or(TestCtlError::NotAwaitingDebugAck)?;

        self.inner.advance(&mut shared, run_id, RunState::Scheduled)?;
        drop(shared);

        info!(run_id, "debugger acknowledged; starting run");
        if ack.send(()).is_err() {
            warn!(run_id, "gated run was no longer waiting for acknowledgment");
        }
        Ok(())
    }

    pub fn state(&self) -> RunState {
        self.inner.lock().machine.state()
    }

    /// Watch run-state changes. The receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.inner.state_tx.subscribe()
    }

    pub fn build_mode(&self) -> BuildMode {
        self.inner.build_mode
    }

    pub fn settings(&self) -> RunSettings {
        self.inner.lock().settings
    }

    pub fn default_timeout(&self) -> Duration {
        self.settings().default_timeout
    }

    pub fn should_wait_for_debugger(&self) -> bool {
        self.settings().should_wait_for_debugger
    }

    /// Whether the next run will actually stop at the debugger gate.
    pub fn debug_gate_enabled(&self) -> bool {
        self.should_wait_for_debugger() && self.inner.build_mode.is_debug()
    }

    /// Change the default timeout. Only allowed while idle.
    pub fn set_default_timeout(&self, timeout: Duration) -> Result<()> {
        self.update_settings(|s| s.default_timeout = timeout)
    }

    /// Change the debugger gate flag. Only allowed while idle.
    pub fn set_should_wait_for_debugger(&self, wait: bool) -> Result<()> {
        self.update_settings(|s| s.should_wait_for_debugger = wait)
    }

    fn update_settings(&self, f: impl FnOnce(&mut RunSettings)) -> Result<()> {
        let mut shared = self.inner.lock();
        let state = shared.machine.state();
        if state != RunState::Idle {
            return Err(TestCtlError::SettingsLocked(state));
        }
        f(&mut shared.settings);
        debug!(settings = ?shared.settings, "run settings updated");
        Ok(())
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, shared: &mut Shared, run_id: RunId, next: RunState) -> Result<()> {
        let from = shared.machine.advance(run_id, next)?;
        self.state_tx.send_replace(next);
        info!(run_id, from = %from, to = %next, "run state changed");
        Ok(())
    }

    pub(crate) fn transition(&self, run_id: RunId, next: RunState) -> Result<()> {
        let mut shared = self.lock();
        self.advance(&mut shared, run_id, next)
    }

    pub(crate) fn reporter(&self) -> &dyn RunReporter {
        self.reporter.as_ref()
    }

    fn dispatch(&self, job: RunJob) {
        let run_id = job.run_id;
        debug!(run_id, units = job.run_set.len(), "dispatching run to background executor");
        if self.executor_tx.send(job).is_err() {
            error!(run_id, "background executor is gone; run cannot start");
        }
    }

    fn prompt_for_debugger(&self, run_id: RunId) {
        let bridge = Arc::clone(&self.bridge);
        if let Err(job) = self
            .primary
            .dispatch(move || bridge.prompt_for_debugger(run_id))
        {
            warn!(run_id, "primary context closed; prompting from the caller instead");
            job();
        }
    }

    /// Hop to the primary context and finish `run_id` there.
    pub(crate) fn finish(
        self: &Arc<Self>,
        run_id: RunId,
        completion: Option<CompletionCallback>,
        report: RunReport,
        report_tx: oneshot::Sender<RunReport>,
    ) {
        let inner = Arc::clone(self);
        let finish = move || inner.complete_run(run_id, completion, report, report_tx);

        if let Err(job) = self.primary.dispatch(finish) {
            warn!(run_id, "primary context closed; completing run on background executor");
            job();
        }
    }

    fn complete_run(
        &self,
        run_id: RunId,
        completion: Option<CompletionCallback>,
        report: RunReport,
        report_tx: oneshot::Sender<RunReport>,
    ) {
        if let Some(callback) = completion {
            debug!(run_id, "invoking completion callback");
            if let Err(payload) = catch_unwind(AssertUnwindSafe(callback)) {
                error!(
                    run_id,
                    panic = %panic_message(payload),
                    "completion callback panicked"
                );
            }
        }

        self.bridge.testing_finished(run_id);

        if let Err(err) = self.transition(run_id, RunState::Idle) {
            error!(run_id, error = %err, "failed to return coordinator to idle");
        }

        if report_tx.send(report).is_err() {
            debug!(run_id, "run handle dropped before the report was delivered");
        }
    }
}

/// Returned for every accepted run request.
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    report_rx: oneshot::Receiver<RunReport>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Wait for the run to finish.
    ///
    /// Resolves after the completion callback and the bridge signal, once
    /// the coordinator is idle again.
    pub async fn report(self) -> Result<RunReport> {
        let run_id = self.run_id;
        self.report_rx.await.map_err(|_| {
            TestCtlError::Other(anyhow::anyhow!("run {run_id} ended without a report"))
        })
    }
}
