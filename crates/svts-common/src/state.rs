//! Generalized lifecycle state machine shared by the sequence engine and
//! closed-loop testers (spec components J/L).

use crate::error::SvtsError;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a sequence or tester instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EngineState {
    /// Loaded but not started.
    Idle,
    /// Actively stepping.
    Running,
    /// Stepping suspended; resumable.
    Paused,
    /// Halted by request; not resumable without a reset.
    Stopped,
    /// Ran to its natural end.
    Completed,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EngineState::Idle => "IDLE",
            EngineState::Running => "RUNNING",
            EngineState::Paused => "PAUSED",
            EngineState::Stopped => "STOPPED",
            EngineState::Completed => "COMPLETED",
        };
        write!(f, "{s}")
    }
}

impl EngineState {
    /// Whether a transition from `self` to `target` is a legal edge.
    #[must_use]
    pub fn can_transition_to(self, target: EngineState) -> bool {
        use EngineState::{Completed, Idle, Paused, Running, Stopped};
        matches!(
            (self, target),
            (Idle, Running)
                | (Running, Paused)
                | (Running, Stopped)
                | (Running, Completed)
                | (Paused, Running)
                | (Paused, Stopped)
                | (Stopped, Idle)
                | (Completed, Idle)
        )
    }

    /// True while stepping should continue to be driven.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, EngineState::Running)
    }

    /// True once no further transition out of this state is possible
    /// without an explicit reset back to `Idle`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, EngineState::Stopped | EngineState::Completed)
    }
}

/// Thin wrapper tracking the current/previous state and transition count,
/// rejecting illegal edges at the boundary.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: EngineState,
    previous: EngineState,
    transition_count: u64,
}

impl StateMachine {
    /// Construct a machine starting in `Idle`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: EngineState::Idle,
            previous: EngineState::Idle,
            transition_count: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn current(&self) -> EngineState {
        self.current
    }

    /// State prior to the most recent transition.
    #[must_use]
    pub fn previous(&self) -> EngineState {
        self.previous
    }

    /// Number of successful transitions made so far.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt a transition, failing with `InvalidStateTransition` if the
    /// edge is not in the validity table.
    pub fn transition(&mut self, target: EngineState) -> Result<(), SvtsError> {
        if !self.current.can_transition_to(target) {
            return Err(SvtsError::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            });
        }
        self.previous = self.current;
        self.current = target;
        self.transition_count += 1;
        Ok(())
    }

    /// Force the machine back to `Idle`, bypassing the validity table.
    /// Used when a fresh run is loaded after a `Stopped`/`Completed` end.
    pub fn reset(&mut self) {
        self.previous = self.current;
        self.current = EngineState::Idle;
        self.transition_count += 1;
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
