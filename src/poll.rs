// src/poll.rs

//! Readiness polling.
//!
//! Units use [`Poller`] to wait on conditions owned by something else (a UI
//! element becoming tappable, a file appearing, a process printing a line).
//! The predicate is re-evaluated every [`POLL_INTERVAL`] until it reports
//! `true` or the timeout elapses. Between evaluations the poller sleeps on the
//! Tokio timer, so the calling task yields instead of spinning.
//!
//! Time is read from `tokio::time`, which lets tests drive the poller with a
//! paused clock.

use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

/// Delay between two evaluations of a predicate.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Boxed error raised by a predicate.
pub type ConditionError = Box<dyn StdError + Send + Sync + 'static>;

/// Why a wait ended without the condition holding.
#[derive(Error, Debug)]
pub enum PollError {
    /// The predicate kept returning `false` until the deadline passed.
    #[error("condition not met within {timeout:?} (waited {elapsed:?})")]
    Timeout { timeout: Duration, elapsed: Duration },

    /// The predicate itself failed; polling stopped at that point.
    #[error("condition could not be evaluated: {0}")]
    Condition(#[source] ConditionError),
}

impl PollError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout { .. })
    }
}

/// Bounded-timeout retry primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    timeout: Duration,
    interval: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Poller {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: POLL_INTERVAL,
        }
    }

    /// Same poller with a different timeout for a single call site.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Same poller with a different interval. A zero interval is bumped to
    /// one millisecond so the wait still yields.
    pub fn with_interval(self, interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            ..self
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until `predicate` returns `Ok(true)`.
    ///
    /// Returns the elapsed time on success. The predicate is evaluated at
    /// least once, even with a zero timeout. The last sleep is clipped to the
    /// remaining budget, so a timeout is reported no later than one interval
    /// after the deadline.
    pub async fn until<F, E>(&self, mut predicate: F) -> Result<Duration, PollError>
    where
        F: FnMut() -> Result<bool, E>,
        E: Into<ConditionError>,
    {
        self.until_async(move || std::future::ready(predicate()))
            .await
    }

    /// Like [`Poller::until`], for predicates that need to await.
    pub async fn until_async<F, Fut, E>(&self, mut predicate: F) -> Result<Duration, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Into<ConditionError>,
    {
        let start = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match predicate().await {
                Ok(true) => {
                    let elapsed = start.elapsed();
                    trace!(attempts, ?elapsed, "condition met");
                    return Ok(elapsed);
                }
                Ok(false) => {}
                Err(err) => {
                    let err = err.into();
                    debug!(attempts, error = %err, "condition evaluation failed");
                    return Err(PollError::Condition(err));
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                debug!(attempts, timeout = ?self.timeout, ?elapsed, "condition timed out");
                return Err(PollError::Timeout {
                    timeout: self.timeout,
                    elapsed,
                });
            }

            sleep(self.interval.min(self.timeout - elapsed)).await;
        }
    }
}
