//! sidecar-session - Streaming session controller
//!
//! - `machine` - turn lifecycle state machine
//! - `turn` - accumulators for the turn in flight
//! - `stream` - cancellation-aware stream consumption
//! - `persistence` - debounced transcript writes
//! - `quick_action` - canned single-shot actions
//! - `controller` - the session controller tying it together

pub mod controller;
pub mod machine;
pub mod persistence;
pub mod quick_action;
pub mod stream;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{
    compose_prompt, AnalyzeOutcome, AutoConfirm, ChunkDisposition, ConfirmationGate,
    QuickActionOutcome, SessionController, SessionControllerBuilder, SubmitOutcome,
    SubmitRequest, TurnOutcome, STOPPED_MARKER,
};
pub use machine::{StateMachine, TurnEvent, TurnState};
pub use persistence::{PersistenceScheduler, DEFAULT_DEBOUNCE};
pub use quick_action::{QuickAction, QUICK_ACTION_MODEL};
pub use turn::{StreamingTurn, TurnKind};
