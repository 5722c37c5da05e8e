//! Market data collaborators.

pub mod provider;

pub use provider::{FetchError, PriceSource};
