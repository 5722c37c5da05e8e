//! Entry/exit rules over an indicator snapshot.
//!
//! Entry: RSI below the threshold AND every enabled `for_entry` indicator
//! bullish (MACD crossed above its signal line, Alligator lips > teeth > jaw).
//! Exit: any enabled `for_exit` indicator bearish.
//! A reading that could not be computed never confirms anything.

use serde::Serialize;

use super::snapshot::{IndicatorSnapshot, IndicatorSuite};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Signals {
    pub entry: bool,
    pub exit: bool,
}

impl Signals {
    pub const NONE: Signals = Signals {
        entry: false,
        exit: false,
    };
}

pub fn evaluate(snapshot: &IndicatorSnapshot, rsi_threshold: f64, suite: &IndicatorSuite) -> Signals {
    let oversold = matches!(snapshot.rsi, Ok(rsi) if rsi < rsi_threshold);

    let macd_role = suite.macd_role().unwrap_or_default();
    let alligator_role = suite.alligator_role().unwrap_or_default();

    let macd_bullish = snapshot
        .macd
        .as_ref()
        .map(|r| matches!(r, Ok(m) if m.crossed_above()));
    let macd_bearish = snapshot
        .macd
        .as_ref()
        .is_some_and(|r| matches!(r, Ok(m) if m.crossed_below()));
    let alligator_bullish = snapshot
        .alligator
        .as_ref()
        .map(|r| matches!(r, Ok(a) if a.is_bullish()));
    let alligator_bearish = snapshot
        .alligator
        .as_ref()
        .is_some_and(|r| matches!(r, Ok(a) if a.is_bearish()));

    // An enabled entry gate that did not confirm blocks the entry.
    let macd_gate = !macd_role.for_entry || macd_bullish.unwrap_or(true);
    let alligator_gate = !alligator_role.for_entry || alligator_bullish.unwrap_or(true);

    let entry = oversold && macd_gate && alligator_gate;
    let exit = (macd_role.for_exit && macd_bearish) || (alligator_role.for_exit && alligator_bearish);

    Signals { entry, exit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AlligatorParams, MacdParams};
    use crate::indicators::{AlligatorReading, IndicatorError, MacdReading};
    use crate::signals::IndicatorRole;

    const ENTRY: IndicatorRole = IndicatorRole {
        for_entry: true,
        for_exit: false,
    };
    const EXIT: IndicatorRole = IndicatorRole {
        for_entry: false,
        for_exit: true,
    };

    fn snapshot(rsi: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: Ok(rsi),
            macd: None,
            alligator: None,
        }
    }

    fn missing(name: &str) -> IndicatorError {
        IndicatorError::InsufficientData {
            indicator: name.into(),
            required: 35,
            available: 10,
        }
    }

    const BULLISH_CROSS: MacdReading = MacdReading {
        macd: 1.0,
        signal: 0.5,
        prev_macd: 0.2,
        prev_signal: 0.4,
    };
    const BEARISH_CROSS: MacdReading = MacdReading {
        macd: 0.1,
        signal: 0.5,
        prev_macd: 0.6,
        prev_signal: 0.4,
    };
    const BULLISH_ALLIGATOR: AlligatorReading = AlligatorReading {
        jaw: 100.0,
        teeth: 101.0,
        lips: 102.0,
    };
    const BEARISH_ALLIGATOR: AlligatorReading = AlligatorReading {
        jaw: 102.0,
        teeth: 101.0,
        lips: 100.0,
    };

    #[test]
    fn rsi_only_entry() {
        let suite = IndicatorSuite::new(14);
        assert!(evaluate(&snapshot(25.0), 30.0, &suite).entry);
        assert!(!evaluate(&snapshot(30.0), 30.0, &suite).entry);
        assert!(!evaluate(&snapshot(45.0), 30.0, &suite).entry);
        assert!(!evaluate(&snapshot(25.0), 30.0, &suite).exit);
    }

    #[test]
    fn rsi_insufficient_data_blocks_entry() {
        let suite = IndicatorSuite::new(14);
        let snap = IndicatorSnapshot {
            rsi: Err(missing("rsi_14")),
            macd: None,
            alligator: None,
        };
        assert_eq!(evaluate(&snap, 30.0, &suite), Signals::NONE);
    }

    #[test]
    fn entry_gate_requires_macd_cross() {
        let suite = IndicatorSuite::new(14).with_macd(MacdParams::default(), ENTRY);

        let mut snap = snapshot(25.0);
        snap.macd = Some(Ok(BULLISH_CROSS));
        assert!(evaluate(&snap, 30.0, &suite).entry);

        snap.macd = Some(Ok(BEARISH_CROSS));
        assert!(!evaluate(&snap, 30.0, &suite).entry);

        snap.macd = Some(Err(missing("macd_12_26_9")));
        assert!(!evaluate(&snap, 30.0, &suite).entry);
    }

    #[test]
    fn entry_requires_all_gates() {
        let suite = IndicatorSuite::new(14)
            .with_macd(MacdParams::default(), ENTRY)
            .with_alligator(AlligatorParams::default(), ENTRY);

        let mut snap = snapshot(25.0);
        snap.macd = Some(Ok(BULLISH_CROSS));
        snap.alligator = Some(Ok(BEARISH_ALLIGATOR));
        assert!(!evaluate(&snap, 30.0, &suite).entry);

        snap.alligator = Some(Ok(BULLISH_ALLIGATOR));
        assert!(evaluate(&snap, 30.0, &suite).entry);
    }

    #[test]
    fn exit_only_indicator_does_not_gate_entry() {
        let suite = IndicatorSuite::new(14).with_alligator(AlligatorParams::default(), EXIT);
        let mut snap = snapshot(25.0);
        snap.alligator = Some(Ok(BEARISH_ALLIGATOR));

        let signals = evaluate(&snap, 30.0, &suite);
        assert!(signals.entry);
        assert!(signals.exit);
    }

    #[test]
    fn exit_fires_on_any_bearish_exit_indicator() {
        let suite = IndicatorSuite::new(14)
            .with_macd(MacdParams::default(), EXIT)
            .with_alligator(AlligatorParams::default(), EXIT);

        let mut snap = snapshot(60.0);
        snap.macd = Some(Ok(BEARISH_CROSS));
        snap.alligator = Some(Ok(BULLISH_ALLIGATOR));
        assert!(evaluate(&snap, 30.0, &suite).exit);

        snap.macd = Some(Err(missing("macd_12_26_9")));
        assert!(!evaluate(&snap, 30.0, &suite).exit);
    }

    #[test]
    fn no_exit_indicator_means_no_exit() {
        let suite = IndicatorSuite::new(14).with_macd(MacdParams::default(), ENTRY);
        let mut snap = snapshot(60.0);
        snap.macd = Some(Ok(BEARISH_CROSS));
        assert!(!evaluate(&snap, 30.0, &suite).exit);
    }
}
