//! IndicatorSuite: the configured indicator set, computed in one pass.

use crate::config::{AlligatorParams, BotConfig, IndicatorConfig, MacdParams};
use crate::domain::PriceWindow;
use crate::indicators::{
    Alligator, AlligatorReading, Indicator, IndicatorError, Macd, MacdReading, Rsi,
};

/// Which decisions an optional indicator takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorRole {
    pub for_entry: bool,
    pub for_exit: bool,
}

impl<P> From<&IndicatorConfig<P>> for IndicatorRole {
    fn from(config: &IndicatorConfig<P>) -> Self {
        Self {
            for_entry: config.for_entry,
            for_exit: config.for_exit,
        }
    }
}

/// RSI plus whichever optional indicators are enabled.
#[derive(Debug, Clone)]
pub struct IndicatorSuite {
    rsi: Rsi,
    macd: Option<(Macd, IndicatorRole)>,
    alligator: Option<(Alligator, IndicatorRole)>,
}

/// Latest readings of every indicator in a suite.
///
/// Disabled indicators are `None`; an enabled indicator without enough bars
/// carries its `InsufficientData` error.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub rsi: Result<f64, IndicatorError>,
    pub macd: Option<Result<MacdReading, IndicatorError>>,
    pub alligator: Option<Result<AlligatorReading, IndicatorError>>,
}

impl IndicatorSuite {
    /// RSI only.
    pub fn new(rsi_period: usize) -> Self {
        Self {
            rsi: Rsi::new(rsi_period),
            macd: None,
            alligator: None,
        }
    }

    pub fn with_macd(mut self, params: MacdParams, role: IndicatorRole) -> Self {
        self.macd = Some((Macd::new(params.fast, params.slow, params.signal), role));
        self
    }

    pub fn with_alligator(mut self, params: AlligatorParams, role: IndicatorRole) -> Self {
        self.alligator = Some((
            Alligator::new(params.jaw_period, params.teeth_period, params.lips_period),
            role,
        ));
        self
    }

    /// Build from a validated config; disabled blocks are left out.
    pub fn from_config(config: &BotConfig) -> Self {
        let mut suite = Self::new(config.rsi_period);
        if config.macd.enabled {
            suite = suite.with_macd(config.macd.params, IndicatorRole::from(&config.macd));
        }
        if config.alligator.enabled {
            suite = suite.with_alligator(
                config.alligator.params,
                IndicatorRole::from(&config.alligator),
            );
        }
        suite
    }

    pub fn rsi(&self) -> &Rsi {
        &self.rsi
    }

    pub fn macd_role(&self) -> Option<IndicatorRole> {
        self.macd.as_ref().map(|(_, role)| *role)
    }

    pub fn alligator_role(&self) -> Option<IndicatorRole> {
        self.alligator.as_ref().map(|(_, role)| *role)
    }

    /// Window capacity that lets every enabled indicator produce a reading.
    pub fn required_bars(&self) -> usize {
        let mut required = self.rsi.required_bars();
        if let Some((macd, _)) = &self.macd {
            required = required.max(macd.required_bars());
        }
        if let Some((alligator, _)) = &self.alligator {
            required = required.max(alligator.required_bars());
        }
        required
    }

    pub fn snapshot(&self, window: &PriceWindow) -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: self.rsi.latest(window),
            macd: self.macd.as_ref().map(|(m, _)| m.latest(window)),
            alligator: self.alligator.as_ref().map(|(a, _)| a.latest(window)),
        }
    }
}

impl IndicatorSnapshot {
    /// RSI value if it could be computed.
    pub fn rsi_value(&self) -> Option<f64> {
        self.rsi.as_ref().ok().copied()
    }

    /// True when every enabled indicator produced a reading.
    pub fn is_complete(&self) -> bool {
        self.rsi.is_ok()
            && self.macd.as_ref().map_or(true, |r| r.is_ok())
            && self.alligator.as_ref().map_or(true, |r| r.is_ok())
    }
}
