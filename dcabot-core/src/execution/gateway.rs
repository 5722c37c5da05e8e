//! Order gateway trait and structured order errors.

use thiserror::Error;

use crate::domain::{Fill, OrderSide};

/// Why an order did not fill. The state machine never transitions on any of
/// these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("insufficient {asset} balance: need {required:.8}, have {available:.8}")]
    InsufficientBalance {
        asset: String,
        required: f64,
        available: f64,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed order response: {0}")]
    Malformed(String),

    #[error("hard stop: exchange requests blocked (circuit breaker open)")]
    CircuitOpen,
}

/// Places market orders and reports what actually filled.
pub trait OrderGateway {
    fn name(&self) -> &str;

    fn submit_market_order(
        &mut self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<Fill, OrderError>;

    /// Latest observed price for a symbol. Simulated gateways fill at it;
    /// exchange gateways ignore it.
    fn observe_price(&mut self, _symbol: &str, _price: f64) {}

    /// Free balance of a quote asset, when the gateway can tell.
    fn quote_balance(&mut self, _asset: &str) -> Result<Option<f64>, OrderError> {
        Ok(None)
    }
}
