// src/bridge.rs

//! Host driver bridge.
//!
//! The automation driver that launched the host keeps issuing commands until
//! it is told testing is over. [`HostBridge`] is how the coordinator tells
//! it. Both methods are called on the primary context.

use tracing::info;

use crate::unit::RunId;

pub trait HostBridge: Send + Sync {
    /// A run is holding for a debugger. The host should surface this to the
    /// developer (an alert, a console prompt) and call
    /// `RunCoordinator::acknowledge_debugger` once they are ready.
    fn prompt_for_debugger(&self, run_id: RunId) {
        let _ = run_id;
    }

    /// The run has completed and its completion callback has returned.
    /// Emitted exactly once per run.
    fn testing_finished(&self, run_id: RunId);
}

/// Bridge that only logs; used by the `testctl` binary, where the driver
/// watches the process output instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogBridge;

impl HostBridge for LogBridge {
    fn prompt_for_debugger(&self, run_id: RunId) {
        info!(run_id, "waiting to start testing: attach a debugger, then press Enter");
    }

    fn testing_finished(&self, run_id: RunId) {
        info!(run_id, "testing finished; releasing automation driver");
    }
}
