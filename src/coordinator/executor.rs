// src/coordinator/executor.rs

//! Background executor that runs run sets.
//!
//! A single loop task receives one [`RunJob`] per accepted run and executes
//! its units strictly one after another. Each unit runs in its own Tokio task
//! so that an error or a panic is confined to that unit; the loop records the
//! outcome and moves on to the next one.

use std::any::Any;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::unit::{RunId, RunSet, UnitContext, UnitOutcome, UnitRef};

use super::report::{RunReport, UnitResult};
use super::{CompletionCallback, Inner, RunState};

/// Everything the executor needs to carry one run to completion.
pub(crate) struct RunJob {
    pub(crate) run_id: RunId,
    pub(crate) run_set: RunSet,
    pub(crate) context: UnitContext,
    pub(crate) completion: Option<CompletionCallback>,
    pub(crate) report_tx: oneshot::Sender<RunReport>,
    pub(crate) coordinator: Arc<Inner>,
}

/// Spawn the background executor loop on `runtime`.
///
/// The loop exits once every sender has been dropped, i.e. when the last
/// coordinator handle goes away.
pub(crate) fn spawn_executor(runtime: &Handle) -> mpsc::UnboundedSender<RunJob> {
    let (tx, mut rx) = mpsc::unbounded_channel::<RunJob>();

    runtime.spawn(async move {
        info!("executor loop started");

        while let Some(job) = rx.recv().await {
            execute_run(job).await;
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

async fn execute_run(job: RunJob) {
    let RunJob {
        run_id,
        run_set,
        context,
        completion,
        report_tx,
        coordinator,
    } = job;

    if let Err(err) = coordinator.transition(run_id, RunState::Running) {
        error!(run_id, error = %err, "could not start run");
        return;
    }

    let mut report = RunReport {
        run_id,
        results: Vec::with_capacity(run_set.len()),
        skipped_unsupported: run_set.skipped_unsupported(),
        skipped_unfocused: run_set.skipped_unfocused(),
        focus_applied: run_set.focus_applied(),
    };

    for unit in run_set.into_units() {
        coordinator.reporter().unit_started(run_id, unit.name());
        let result = run_unit(unit, &context).await;
        coordinator.reporter().unit_finished(run_id, &result);
        report.results.push(result);
    }

    info!(
        run_id,
        executed = report.results.len(),
        passed = report.passed(),
        failed = report.failed(),
        "all units executed"
    );

    if let Err(err) = coordinator.transition(run_id, RunState::Completed) {
        error!(run_id, error = %err, "could not mark run completed");
        return;
    }

    coordinator.finish(run_id, completion, report, report_tx);
}

/// Run one unit in isolation and classify how it ended.
async fn run_unit(unit: UnitRef, ctx: &UnitContext) -> UnitResult {
    let name = unit.name().to_string();
    let ctx = ctx.clone();
    let started = Instant::now();

    let handle = tokio::spawn(async move { unit.run(&ctx).await });

    let outcome = match handle.await {
        Ok(Ok(())) => UnitOutcome::Passed,
        Ok(Err(err)) => UnitOutcome::Failed(format!("{err:#}")),
        Err(join_err) if join_err.is_panic() => {
            UnitOutcome::Panicked(panic_message(join_err.into_panic()))
        }
        Err(join_err) => UnitOutcome::Failed(join_err.to_string()),
    };

    debug!(unit = %name, ?outcome, "unit task joined");

    UnitResult {
        name,
        outcome,
        duration: started.elapsed(),
    }
}

pub(super) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
