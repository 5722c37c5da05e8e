//! Moving Average Convergence Divergence (MACD).
//!
//! MACD line = EMA(fast) - EMA(slow) of closes.
//! Signal line = EMA(signal) of the MACD line.
//! The latest reading carries the two newest points of both lines so callers
//! can test for a crossover. Needs max(fast, slow) + signal closes.

use crate::domain::PriceWindow;

use super::ema::ema_of_series;
use super::{ensure_bars, Indicator, IndicatorError};

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    name: String,
}

/// Newest and previous points of the MACD and signal lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    pub prev_macd: f64,
    pub prev_signal: f64,
}

impl MacdReading {
    pub fn histogram(&self) -> f64 {
        self.macd - self.signal
    }

    /// MACD moved from at-or-below the signal line to above it.
    pub fn crossed_above(&self) -> bool {
        self.prev_macd <= self.prev_signal && self.macd > self.signal
    }

    /// MACD moved from at-or-above the signal line to below it.
    pub fn crossed_below(&self) -> bool {
        self.prev_macd >= self.prev_signal && self.macd < self.signal
    }
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(
            fast >= 1 && slow >= 1 && signal >= 1,
            "MACD periods must be >= 1"
        );
        Self {
            fast,
            slow,
            signal,
            name: format!("macd_{fast}_{slow}_{signal}"),
        }
    }

    /// MACD and signal line series over `closes`, `NaN` during warm-up.
    pub fn compute(&self, closes: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let fast = ema_of_series(closes, self.fast);
        let slow = ema_of_series(closes, self.slow);
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_of_series(&macd, self.signal);
        (macd, signal)
    }
}

impl Indicator for Macd {
    type Reading = MacdReading;

    fn name(&self) -> &str {
        &self.name
    }

    fn required_bars(&self) -> usize {
        self.fast.max(self.slow) + self.signal
    }

    fn latest(&self, window: &PriceWindow) -> Result<MacdReading, IndicatorError> {
        ensure_bars(&self.name, self.required_bars(), window)?;
        let (macd, signal) = self.compute(&window.closes());
        let n = macd.len();
        Ok(MacdReading {
            macd: macd[n - 1],
            signal: signal[n - 1],
            prev_macd: macd[n - 2],
            prev_signal: signal[n - 2],
        })
    }
}
