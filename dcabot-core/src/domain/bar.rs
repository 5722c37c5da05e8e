//! PriceBar: the market data unit the engine consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closing price of one kline, stamped with the kline's open time.
///
/// Only the close feeds the indicators; the remaining OHLCV fields of the
/// exchange kline are dropped at the collaborator boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl PriceBar {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self { timestamp, close }
    }

    /// A close the indicators can use: finite and strictly positive.
    pub fn is_sane(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}
