// src/unit/mod.rs

//! Test units as seen by the coordinator.
//!
//! The coordinator only ever asks a unit two questions (does it support the
//! current platform, is it focused) and tells it to run. Everything else about
//! a unit is its own business, which is what lets heterogeneous
//! implementations share one run.
//!
//! - [`filter`] turns candidate units into the [`filter::RunSet`] for a run.
//! - [`command`] provides [`command::CommandUnit`], the unit type built from
//!   suite files by the `testctl` binary.

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::poll::Poller;

pub mod command;
pub mod filter;

pub use filter::{RunSet, select_run_set};

/// Identifier of one run, unique for the coordinator's lifetime.
pub type RunId = u64;

/// Future returned by [`TestUnit::run`].
pub type UnitFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// A unit of test logic supplied from outside the coordinator.
pub trait TestUnit: Send + Sync {
    /// Stable name; also the unit's identity inside a test set.
    fn name(&self) -> &str;

    fn supports_current_platform(&self) -> bool;

    fn is_focused(&self) -> bool;

    /// Execute the unit. Returning an error (or panicking) marks this unit as
    /// failed; the rest of the run is unaffected.
    fn run<'a>(&'a self, ctx: &'a UnitContext) -> UnitFuture<'a>;
}

/// Shared handle to a unit.
///
/// Equality and hashing go through [`TestUnit::name`], so a `HashSet<UnitRef>`
/// holds at most one unit per name.
#[derive(Clone)]
pub struct UnitRef(Arc<dyn TestUnit>);

impl UnitRef {
    pub fn new<U: TestUnit + 'static>(unit: U) -> Self {
        Self(Arc::new(unit))
    }
}

impl From<Arc<dyn TestUnit>> for UnitRef {
    fn from(unit: Arc<dyn TestUnit>) -> Self {
        Self(unit)
    }
}

impl Deref for UnitRef {
    type Target = dyn TestUnit;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for UnitRef {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for UnitRef {}

impl Hash for UnitRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

impl fmt::Debug for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UnitRef").field(&self.name()).finish()
    }
}

/// What a unit gets to see while it runs.
#[derive(Debug, Clone)]
pub struct UnitContext {
    run_id: RunId,
    poller: Poller,
}

impl UnitContext {
    pub fn new(run_id: RunId, default_timeout: Duration) -> Self {
        Self {
            run_id,
            poller: Poller::new(default_timeout),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Poller configured with the coordinator's default timeout for this run.
    pub fn poller(&self) -> Poller {
        self.poller
    }
}

/// Result of executing a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Passed,
    Failed(String),
    Panicked(String),
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UnitOutcome::Passed)
    }
}
