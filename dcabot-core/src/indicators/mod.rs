//! Indicator implementations.
//!
//! Every indicator exposes two views:
//! - `compute(&[f64])`: full series over a slice of closes, with `NaN`
//!   (or `None`) during warm-up, handy for charts and tests.
//! - `Indicator::latest(&PriceWindow)`: the most recent reading, or an
//!   explicit `InsufficientData` error. Decision code only uses this view so a
//!   warm-up `NaN` can never leak into a signal.

pub mod alligator;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod smma;

pub use alligator::{Alligator, AlligatorReading};
pub use ema::ema_of_series;
pub use macd::{Macd, MacdReading};
pub use rsi::Rsi;
pub use smma::smma_of_series;

use thiserror::Error;

use crate::domain::PriceWindow;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    #[error("{indicator} needs {required} bars, window holds {available}")]
    InsufficientData {
        indicator: String,
        required: usize,
        available: usize,
    },
}

/// An indicator evaluated over the rolling price window.
pub trait Indicator: Send + Sync {
    type Reading;

    /// Human-readable name (e.g., "rsi_14", "macd_12_26_9").
    fn name(&self) -> &str;

    /// Bars the window must hold before `latest` returns a reading.
    fn required_bars(&self) -> usize;

    /// Reading at the newest bar of the window.
    fn latest(&self, window: &PriceWindow) -> Result<Self::Reading, IndicatorError>;
}

/// Guard shared by every `latest` implementation.
pub(crate) fn ensure_bars(
    name: &str,
    required: usize,
    window: &PriceWindow,
) -> Result<(), IndicatorError> {
    if window.len() < required {
        Err(IndicatorError::InsufficientData {
            indicator: name.to_string(),
            required,
            available: window.len(),
        })
    } else {
        Ok(())
    }
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
