//! Order execution collaborators.

pub mod gateway;
pub mod paper;

pub use gateway::{OrderError, OrderGateway};
pub use paper::{PaperGateway, PaperTrade};
