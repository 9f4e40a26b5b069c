//! Per-user conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! the transition function never performs I/O, it returns the next state
//! and the effects the runtime must execute.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{AccessChange, ConvContext, ConvState, Target};
pub use transition::{transition, FlowError, TransitionResult};
