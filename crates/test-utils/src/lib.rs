// crates/test-utils/src/lib.rs

pub mod builders;
pub mod fake_bridge;
pub mod fake_unit;

use std::sync::{Arc, Once};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, fmt};

use testctl::coordinator::{CompletionCallback, CoordinatorOptions, RunCoordinator};
use testctl::primary::{PrimaryContext, is_primary_context, primary_context};

use crate::builders::FakeUnitBuilder;
use crate::fake_bridge::RecordingBridge;
use crate::fake_unit::Journal;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// A coordinator wired to a running primary loop and a recording bridge.
///
/// Everything that happens (unit start/end, callbacks, bridge signals) lands
/// in the shared [`Journal`] in the order it happened.
pub struct Harness {
    pub coordinator: RunCoordinator,
    pub bridge: Arc<RecordingBridge>,
    pub journal: Journal,
    pub primary: PrimaryContext,
    primary_loop: JoinHandle<()>,
}

impl Harness {
    /// Must be called from within a Tokio runtime.
    pub fn start(options: CoordinatorOptions) -> Self {
        let journal = Journal::default();
        let bridge = Arc::new(RecordingBridge::new(journal.clone()));
        let (primary, primary_loop) = primary_context();
        let primary_loop = tokio::spawn(primary_loop.run());
        let coordinator = RunCoordinator::new(options, primary.clone(), bridge.clone());

        Self {
            coordinator,
            bridge,
            journal,
            primary,
            primary_loop,
        }
    }

    /// Builder for a fake unit that records into this harness's journal.
    pub fn unit(&self, name: &str) -> FakeUnitBuilder {
        FakeUnitBuilder::new(name, self.journal.clone())
    }

    /// Completion callback recording `callback` (and whether it ran on the
    /// primary context).
    pub fn callback(&self) -> CompletionCallback {
        let journal = self.journal.clone();
        Box::new(move || {
            journal.push(if is_primary_context() {
                "callback".to_string()
            } else {
                "callback(off-primary)".to_string()
            })
        })
    }

    pub async fn shutdown(self) {
        let _ = self.primary.stop();
        let _ = self.primary_loop.await;
    }
}
