// crates/test-utils/src/fake_bridge.rs

use std::sync::Mutex;

use testctl::bridge::HostBridge;
use testctl::primary::is_primary_context;
use testctl::unit::RunId;

use crate::fake_unit::Journal;

/// Bridge that records every signal into a [`Journal`].
pub struct RecordingBridge {
    journal: Journal,
    prompts: Mutex<Vec<RunId>>,
    finished: Mutex<Vec<RunId>>,
    off_primary_calls: Mutex<usize>,
}

impl RecordingBridge {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            prompts: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
            off_primary_calls: Mutex::new(0),
        }
    }

    pub fn prompts(&self) -> Vec<RunId> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Vec<RunId> {
        self.finished.lock().unwrap().clone()
    }

    /// Number of bridge calls that did not arrive on the primary context.
    pub fn off_primary_calls(&self) -> usize {
        *self.off_primary_calls.lock().unwrap()
    }

    fn note_context(&self) {
        if !is_primary_context() {
            *self.off_primary_calls.lock().unwrap() += 1;
        }
    }
}

impl HostBridge for RecordingBridge {
    fn prompt_for_debugger(&self, run_id: RunId) {
        self.note_context();
        self.prompts.lock().unwrap().push(run_id);
        self.journal.push(format!("prompt:{run_id}"));
    }

    fn testing_finished(&self, run_id: RunId) {
        self.note_context();
        self.finished.lock().unwrap().push(run_id);
        self.journal.push(format!("finished:{run_id}"));
    }
}
