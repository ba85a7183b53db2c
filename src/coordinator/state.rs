// src/coordinator/state.rs

//! Pure run-state machine.
//!
//! Synchronous and deterministic: no Tokio, no channels. The async
//! coordinator owns one of these behind a mutex and asks it whether a request
//! or transition is allowed before acting on it.
//!
//! Legal transitions for one run:
//!
//! ```text
//! Idle -> AwaitingDebugAck -> Scheduled -> Running -> Completed -> Idle
//!     \______________________/
//! ```

use std::fmt;

use crate::errors::{Result, TestCtlError};
use crate::unit::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Idle,
    AwaitingDebugAck,
    Scheduled,
    Running,
    Completed,
}

impl RunState {
    /// States in which a run occupies the coordinator.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RunState::AwaitingDebugAck | RunState::Scheduled | RunState::Running
        )
    }

    fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, AwaitingDebugAck)
                | (Idle, Scheduled)
                | (AwaitingDebugAck, Scheduled)
                | (Scheduled, Running)
                | (Running, Completed)
                | (Completed, Idle)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::AwaitingDebugAck => "awaiting debugger acknowledgment",
            RunState::Scheduled => "scheduled",
            RunState::Running => "running",
            RunState::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct RunStateMachine {
    state: RunState,
    current_run: Option<RunId>,
    next_run_id: RunId,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            current_run: None,
            next_run_id: 1,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn current_run(&self) -> Option<RunId> {
        self.current_run
    }

    /// Accept a new run request.
    ///
    /// Only possible from `Idle`; anything else is a scheduling conflict. The
    /// run enters `AwaitingDebugAck` when `gated`, `Scheduled` otherwise.
    /// `Completed` still counts as a conflict: the previous run has not
    /// finished notifying its caller yet.
    pub fn begin(&mut self, gated: bool) -> Result<RunId> {
        if self.state != RunState::Idle {
            return Err(TestCtlError::SchedulingConflict(self.state));
        }

        let run_id = self.next_run_id;
        self.next_run_id += 1;
        self.current_run = Some(run_id);
        self.state = if gated {
            RunState::AwaitingDebugAck
        } else {
            RunState::Scheduled
        };
        Ok(run_id)
    }

    /// Move `run_id` to `next`. Returns the previous state.
    pub fn advance(&mut self, run_id: RunId, next: RunState) -> Result<RunState> {
        let from = self.state;
        if self.current_run != Some(run_id) || !from.can_transition_to(next) {
            return Err(TestCtlError::InvalidTransition { from, to: next });
        }

        self.state = next;
        if next == RunState::Idle {
            self.current_run = None;
        }
        Ok(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_lifecycle_without_gate() {
        let mut sm = RunStateMachine::new();
        let id = sm.begin(false).unwrap();
        assert_eq!(sm.state(), RunState::Scheduled);

        sm.advance(id, RunState::Running).unwrap();
        sm.advance(id, RunState::Completed).unwrap();
        assert_eq!(sm.advance(id, RunState::Idle).unwrap(), RunState::Completed);

        assert_eq!(sm.state(), RunState::Idle);
        assert_eq!(sm.current_run(), None);
    }

    #[test]
    fn gated_run_starts_awaiting_ack() {
        let mut sm = RunStateMachine::new();
        let id = sm.begin(true).unwrap();
        assert_eq!(sm.state(), RunState::AwaitingDebugAck);
        assert!(sm.advance(id, RunState::Running).is_err());
        sm.advance(id, RunState::Scheduled).unwrap();
    }

    #[test]
    fn begin_is_rejected_until_idle_again() {
        let mut sm = RunStateMachine::new();
        let id = sm.begin(false).unwrap();

        for next in [RunState::Running, RunState::Completed] {
            let err = sm.begin(false).unwrap_err();
            assert!(matches!(err, TestCtlError::SchedulingConflict(s) if s == sm.state()));
            sm.advance(id, next).unwrap();
        }
        assert!(sm.begin(false).is_err());

        sm.advance(id, RunState::Idle).unwrap();
        assert_eq!(sm.begin(false).unwrap(), id + 1);
    }

    #[test]
    fn stale_run_id_is_rejected() {
        let mut sm = RunStateMachine::new();
        let id = sm.begin(false).unwrap();
        let err = sm.advance(id + 7, RunState::Running).unwrap_err();
        assert!(matches!(
            err,
            TestCtlError::InvalidTransition {
                from: RunState::Scheduled,
                to: RunState::Running
            }
        ));
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut sm = RunStateMachine::new();
        let id = sm.begin(false).unwrap();
        assert!(sm.advance(id, RunState::Completed).is_err());
        assert!(sm.advance(id, RunState::Idle).is_err());
        assert_eq!(sm.state(), RunState::Scheduled);
    }

    #[test]
    fn active_states() {
        assert!(!RunState::Idle.is_active());
        assert!(RunState::AwaitingDebugAck.is_active());
        assert!(RunState::Scheduled.is_active());
        assert!(RunState::Running.is_active());
        assert!(!RunState::Completed.is_active());
    }
}
