//! Signal evaluation: indicator snapshot in, entry/exit flags out.
//!
//! Signals never see the position. They are pure market timing derived from
//! the price window; the state machine decides what a flag means for the
//! current position.

pub mod evaluator;
pub mod snapshot;

pub use evaluator::{evaluate, Signals};
pub use snapshot::{IndicatorRole, IndicatorSnapshot, IndicatorSuite};
