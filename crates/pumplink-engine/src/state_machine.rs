//! Pump state machine.
//!
//! The physical pump is authoritative: every decoded status sets the
//! confirmed state, with no transition rejected. Alongside it the machine
//! keeps a *display* state that local intent hints may move ahead of the
//! pump (for example straight to `Authorized` after an AUTHORIZE is sent).
//! The next real status overwrites both.
//!
//! ```
//! use pumplink_core::PumpState;
//! use pumplink_engine::PumpStateMachine;
//!
//! let mut machine = PumpStateMachine::new();
//! assert_eq!(machine.confirmed(), PumpState::Reset);
//!
//! machine.apply_intent(PumpState::Authorized);
//! assert_eq!(machine.display(), PumpState::Authorized);
//! assert_eq!(machine.confirmed(), PumpState::Reset);
//!
//! let transition = machine.apply(PumpState::Filling);
//! assert_eq!(transition.from, PumpState::Reset);
//! assert_eq!(machine.display(), PumpState::Filling);
//! ```

use pumplink_core::PumpState;
use std::collections::VecDeque;
use std::time::Instant;

/// Transitions kept for diagnostics.
const MAX_HISTORY_SIZE: usize = 64;

/// One applied status, recorded even when the state did not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: PumpState,
    pub to: PumpState,
    pub timestamp: Instant,
}

impl StateTransition {
    #[must_use]
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }

    /// Entered a terminal state from a different state.
    #[must_use]
    pub fn entered_terminal(&self) -> bool {
        self.is_change() && self.to.is_terminal()
    }
}

#[derive(Debug)]
pub struct PumpStateMachine {
    confirmed: PumpState,
    display: PumpState,
    /// State changes only, oldest first.
    history: VecDeque<StateTransition>,
}

impl PumpStateMachine {
    pub fn new() -> Self {
        Self {
            confirmed: PumpState::default(),
            display: PumpState::default(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    /// Last state reported by the pump.
    pub fn confirmed(&self) -> PumpState {
        self.confirmed
    }

    /// State to show: the confirmed state or a newer intent hint.
    pub fn display(&self) -> PumpState {
        self.display
    }

    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Apply a status reported by the pump.
    pub fn apply(&mut self, state: PumpState) -> StateTransition {
        let transition = StateTransition {
            from: self.confirmed,
            to: state,
            timestamp: Instant::now(),
        };
        self.confirmed = state;
        self.display = state;

        if transition.is_change() {
            if self.history.len() == MAX_HISTORY_SIZE {
                self.history.pop_front();
            }
            self.history.push_back(transition);
        }
        transition
    }

    /// Provisional display state; the confirmed state is untouched.
    pub fn apply_intent(&mut self, state: PumpState) {
        self.display = state;
    }

    /// Back to the initial state with an empty history. Used when the
    /// link is reopened.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for PumpStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
