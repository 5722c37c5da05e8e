//! Alligator: three smoothed moving averages of closes.
//!
//! Jaw (slowest), teeth, lips (fastest). Lips above teeth above jaw is a
//! bullish alignment, the reverse order bearish. The forward shift of the
//! classic chart overlay is not applied; only the ordering is used.

use crate::domain::PriceWindow;

use super::smma::smma_of_series;
use super::{ensure_bars, Indicator, IndicatorError};

#[derive(Debug, Clone)]
pub struct Alligator {
    jaw: usize,
    teeth: usize,
    lips: usize,
    name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlligatorReading {
    pub jaw: f64,
    pub teeth: f64,
    pub lips: f64,
}

impl AlligatorReading {
    pub fn is_bullish(&self) -> bool {
        self.lips > self.teeth && self.teeth > self.jaw
    }

    pub fn is_bearish(&self) -> bool {
        self.lips < self.teeth && self.teeth < self.jaw
    }
}

impl Alligator {
    pub fn new(jaw: usize, teeth: usize, lips: usize) -> Self {
        assert!(
            jaw >= 1 && teeth >= 1 && lips >= 1,
            "Alligator periods must be >= 1"
        );
        Self {
            jaw,
            teeth,
            lips,
            name: format!("alligator_{jaw}_{teeth}_{lips}"),
        }
    }

    /// Full series of readings; `None` until the slowest line has warmed up.
    pub fn compute(&self, closes: &[f64]) -> Vec<Option<AlligatorReading>> {
        let jaw = smma_of_series(closes, self.jaw);
        let teeth = smma_of_series(closes, self.teeth);
        let lips = smma_of_series(closes, self.lips);
        (0..closes.len())
            .map(|i| {
                let reading = AlligatorReading {
                    jaw: jaw[i],
                    teeth: teeth[i],
                    lips: lips[i],
                };
                (!(reading.jaw.is_nan() || reading.teeth.is_nan() || reading.lips.is_nan()))
                    .then_some(reading)
            })
            .collect()
    }
}

impl Indicator for Alligator {
    type Reading = AlligatorReading;

    fn name(&self) -> &str {
        &self.name
    }

    fn required_bars(&self) -> usize {
        self.jaw.max(self.teeth).max(self.lips) + 1
    }

    fn latest(&self, window: &PriceWindow) -> Result<AlligatorReading, IndicatorError> {
        ensure_bars(&self.name, self.required_bars(), window)?;
        let closes = window.closes();
        let last = |period: usize| smma_of_series(&closes, period)[closes.len() - 1];
        Ok(AlligatorReading {
            jaw: last(self.jaw),
            teeth: last(self.teeth),
            lips: last(self.lips),
        })
    }
}
