//! Position management: the DCA / take-profit / trailing state machine.

pub mod state_machine;
pub mod trailing;

pub use state_machine::{Decision, PositionStateMachine};
pub use trailing::TrailingStop;
