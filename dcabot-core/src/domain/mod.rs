//! Domain types for DCABot

pub mod action;
pub mod bar;
pub mod fill;
pub mod order;
pub mod position;
pub mod window;

pub use action::{Action, ExitReason};
pub use bar::PriceBar;
pub use fill::Fill;
pub use order::OrderSide;
pub use position::{Position, PositionStatus};
pub use window::{PriceWindow, WindowError};

/// Symbol type alias
pub type Symbol = String;
