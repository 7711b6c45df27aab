//! Turn lifecycle transitions.

use thiserror::Error;

use super::events::TurnEvent;
use super::states::TurnState;

/// Error type for invalid state transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from:?} with event {event:?}")]
    InvalidTransition { from: TurnState, event: TurnEvent },
}

/// Represents a state transition result.
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: TurnState,
    pub to: TurnState,
    pub event: TurnEvent,
    /// Whether the state actually changed.
    pub changed: bool,
}

/// State machine for the turn lifecycle.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current_state: TurnState,
    /// Transition history (limited).
    history: Vec<StateTransition>,
    max_history: usize,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine in Idle state.
    pub fn new() -> Self {
        Self::with_state(TurnState::Idle)
    }

    pub fn with_state(state: TurnState) -> Self {
        Self {
            current_state: state,
            history: Vec::new(),
            max_history: 50,
        }
    }

    pub fn state(&self) -> &TurnState {
        &self.current_state
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    /// Apply `event`, rejecting transitions the lifecycle does not allow.
    pub fn handle_event(&mut self, event: TurnEvent) -> Result<StateTransition, TransitionError> {
        let old_state = self.current_state.clone();
        let new_state = Self::compute_next_state(&old_state, &event).ok_or_else(|| {
            TransitionError::InvalidTransition {
                from: old_state.clone(),
                event: event.clone(),
            }
        })?;
        let changed = old_state != new_state;

        self.current_state = new_state.clone();

        let transition = StateTransition {
            from: old_state,
            to: new_state,
            event,
            changed,
        };

        self.history.push(transition.clone());
        if self.history.len() > self.max_history {
            self.history.remove(0);
        }

        Ok(transition)
    }

    fn compute_next_state(state: &TurnState, event: &TurnEvent) -> Option<TurnState> {
        use TurnEvent::*;
        use TurnState::*;

        let next = match (state, event) {
            (Idle, Submitted) => Sending,

            (Sending, StreamStarted) => Streaming,
            (Streaming, ChunkReceived) => Streaming,

            (Sending | Streaming, StreamEnded) => Completed,
            (Sending | Streaming, Stopped) => Aborted,
            (Sending | Streaming, TransportFailed { error }) => Failed {
                error: error.clone(),
            },

            (Completed | Aborted | Failed { .. }, Settled) => Idle,

            _ => return None,
        };

        Some(next)
    }

    pub fn can_transition(&self, event: &TurnEvent) -> bool {
        Self::compute_next_state(&self.current_state, event).is_some()
    }
}
