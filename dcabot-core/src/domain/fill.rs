use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution report for a market order.
///
/// `price` is the quantity-weighted average over all partial executions and
/// `fee` is expressed in the quote currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub price: f64,
    pub quantity: f64,
    pub fee: f64,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}
