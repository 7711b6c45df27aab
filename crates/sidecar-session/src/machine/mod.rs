//! State machine module
//!
//! Contains the FSM for the generation turn lifecycle.

mod events;
mod states;
mod transitions;

pub use events::TurnEvent;
pub use states::TurnState;
pub use transitions::{StateMachine, StateTransition, TransitionError};
