//! Relative Strength Index (RSI).
//!
//! Simple rolling means of gains and losses over the last `period` deltas.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Needs period + 1 closes.
//! Edge cases: avg_loss == 0 → 100; both zero → 50; avg_gain == 0 → 0.

use crate::domain::PriceWindow;

use super::{ensure_bars, Indicator, IndicatorError};

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// RSI series over `closes`; `NaN` for the first `period` entries.
    pub fn compute(&self, closes: &[f64]) -> Vec<f64> {
        let n = closes.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period + 1 {
            return result;
        }

        let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        for i in self.period..n {
            // deltas[i - 1] is the change into bar i
            let recent = &deltas[i - self.period..i];
            result[i] = rsi_of_deltas(recent);
        }
        result
    }
}

impl Indicator for Rsi {
    type Reading = f64;

    fn name(&self) -> &str {
        &self.name
    }

    fn required_bars(&self) -> usize {
        self.period + 1
    }

    fn latest(&self, window: &PriceWindow) -> Result<f64, IndicatorError> {
        ensure_bars(&self.name, self.required_bars(), window)?;
        let closes = window.closes();
        let tail = &closes[closes.len() - (self.period + 1)..];
        let deltas: Vec<f64> = tail.windows(2).map(|w| w[1] - w[0]).collect();
        Ok(rsi_of_deltas(&deltas))
    }
}

fn rsi_of_deltas(deltas: &[f64]) -> f64 {
    let n = deltas.len() as f64;
    let avg_gain = deltas.iter().filter(|d| **d > 0.0).sum::<f64>() / n;
    let avg_loss = -deltas.iter().filter(|d| **d < 0.0).sum::<f64>() / n;
    compute_rsi(avg_gain, avg_loss)
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // no movement
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
