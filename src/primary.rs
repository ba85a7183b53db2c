// src/primary.rs

//! The host's primary execution context.
//!
//! The primary context is single-threaded and cooperative: jobs dispatched to
//! it run one after another, in dispatch order, inside [`PrimaryLoop::run`].
//! The coordinator uses it to deliver completion callbacks and bridge signals
//! on the same context that issued the run request.
//!
//! A host embeds this by driving `PrimaryLoop::run` from whatever owns its UI
//! state; the `testctl` binary simply runs it on the main task.

use std::cell::Cell;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{Result, TestCtlError};

/// Work item executed on the primary context.
pub type PrimaryJob = Box<dyn FnOnce() + Send + 'static>;

enum PrimaryMessage {
    Job(PrimaryJob),
    Stop,
}

thread_local! {
    static ON_PRIMARY: Cell<bool> = const { Cell::new(false) };
}

/// Whether the caller is currently executing a job of a [`PrimaryLoop`].
pub fn is_primary_context() -> bool {
    ON_PRIMARY.with(Cell::get)
}

/// Create a connected dispatch handle and loop.
pub fn primary_context() -> (PrimaryContext, PrimaryLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PrimaryContext { tx }, PrimaryLoop { rx })
}

/// Cloneable handle used to hop onto the primary context.
#[derive(Clone)]
pub struct PrimaryContext {
    tx: mpsc::UnboundedSender<PrimaryMessage>,
}

impl std::fmt::Debug for PrimaryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryContext")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl PrimaryContext {
    /// Queue `job` to run on the primary context. Never blocks.
    ///
    /// If the loop is gone the job is handed back so the caller can decide
    /// what to do with it.
    pub fn dispatch<F>(&self, job: F) -> std::result::Result<(), PrimaryJob>
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx
            .send(PrimaryMessage::Job(Box::new(job)))
            .map_err(|e| match e.0 {
                PrimaryMessage::Job(job) => job,
                // only jobs are sent from here
                PrimaryMessage::Stop => Box::new(|| {}) as PrimaryJob,
            })
    }

    /// Ask the loop to exit after the jobs already queued.
    pub fn stop(&self) -> Result<()> {
        self.tx
            .send(PrimaryMessage::Stop)
            .map_err(|_| TestCtlError::PrimaryContextClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side of the primary context.
pub struct PrimaryLoop {
    rx: mpsc::UnboundedReceiver<PrimaryMessage>,
}

impl PrimaryLoop {
    /// Run queued jobs until [`PrimaryContext::stop`] is called or every
    /// handle has been dropped.
    ///
    /// After a stop, jobs that were already queued still run; later
    /// dispatches are handed back to their callers.
    pub async fn run(mut self) {
        info!("primary loop started");

        while let Some(msg) = self.rx.recv().await {
            match msg {
                PrimaryMessage::Job(job) => run_job(job),
                PrimaryMessage::Stop => {
                    debug!("primary loop stop requested");
                    self.rx.close();
                    break;
                }
            }
        }

        let mut drained = 0usize;
        while let Some(msg) = self.rx.recv().await {
            if let PrimaryMessage::Job(job) = msg {
                run_job(job);
                drained += 1;
            }
        }
        if drained > 0 {
            debug!(drained, "ran jobs queued behind stop");
        }

        info!("primary loop finished");
    }
}

fn run_job(job: PrimaryJob) {
    ON_PRIMARY.with(|flag| flag.set(true));
    job();
    ON_PRIMARY.with(|flag| flag.set(false));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn jobs_run_in_order_on_primary() {
        let (ctx, lp) = primary_context();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = Arc::clone(&seen);
            ctx.dispatch(move || seen.lock().unwrap().push((i, is_primary_context())))
                .ok()
                .unwrap();
        }
        ctx.stop().unwrap();
        lp.run().await;

        assert_eq!(*seen.lock().unwrap(), vec![(0, true), (1, true), (2, true)]);
        assert!(!is_primary_context());
    }

    #[tokio::test]
    async fn dispatch_after_loop_exit_returns_the_job() {
        let (ctx, lp) = primary_context();
        drop(lp);
        let job = ctx.dispatch(|| {}).unwrap_err();
        job();
        assert!(ctx.is_closed());
        assert!(matches!(ctx.stop(), Err(TestCtlError::PrimaryContextClosed)));
    }

    #[tokio::test]
    async fn jobs_queued_behind_stop_still_run() {
        let (ctx, lp) = primary_context();
        let seen = Arc::new(Mutex::new(Vec::new()));

        ctx.stop().unwrap();
        let late = Arc::clone(&seen);
        ctx.dispatch(move || late.lock().unwrap().push(is_primary_context()))
            .ok()
            .unwrap();
        lp.run().await;

        assert_eq!(*seen.lock().unwrap(), vec![true]);
        assert!(ctx.dispatch(|| {}).is_err());
    }
}
