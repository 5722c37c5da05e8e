//! Per-symbol position state machine.
//!
//! Transitions, in priority order:
//!
//! | From     | Condition                                   | Result                         |
//! |----------|---------------------------------------------|--------------------------------|
//! | Flat     | entry signal                                | Buy base_investment / price    |
//! | Holding  | price >= entry * (1 + take_profit)          | arm trailing (no trade)        |
//! | Holding  | exit signal                                 | Sell all, IndicatorExit        |
//! | Holding  | price <= DCA trigger, level < max           | Buy next_buy_size / price      |
//! | Holding  | price <= DCA trigger, level >= max          | Sell all, ForcedStopOut        |
//! | Trailing | price > peak                                | raise peak (no trade)          |
//! | Trailing | drawdown from peak >= trailing_stop         | Sell all, TakeProfit           |
//! | Trailing | exit signal                                 | Sell all, IndicatorExit        |
//!
//! Trades are only committed through `confirm` once a fill exists; a failed
//! order leaves the position untouched.

use chrono::{DateTime, Utc};

use crate::config::StrategyContext;
use crate::domain::{Action, ExitReason, Fill, Position, PositionStatus};
use crate::signals::Signals;

use super::trailing::TrailingStop;

/// Outcome of evaluating one price observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Nothing changes.
    Hold,
    /// State change that needs no order (arming or raising the trailing peak).
    Update(Position),
    /// Order to realize; state moves only after `confirm`.
    Trade(Action),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionStateMachine {
    position: Position,
}

impl PositionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(position: Position) -> Self {
        Self { position }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn into_position(self) -> Position {
        self.position
    }

    /// Decide what the observed price means for the current position.
    pub fn evaluate(&self, price: f64, signals: Signals, ctx: &StrategyContext) -> Decision {
        if !(price.is_finite() && price > 0.0) {
            return Decision::Hold;
        }
        let pos = &self.position;

        match pos.status {
            PositionStatus::Flat => {
                if signals.entry {
                    buy(ctx.base_investment, price, ctx)
                } else {
                    Decision::Hold
                }
            }
            PositionStatus::Holding => {
                if price >= ctx.take_profit_price(pos.entry_price) {
                    let mut armed = pos.clone();
                    armed.status = PositionStatus::Trailing;
                    armed.peak_price = price;
                    return Decision::Update(armed);
                }
                if signals.exit {
                    return sell_all(pos, price, ExitReason::IndicatorExit);
                }
                if price <= ctx.dca_trigger_price(pos.anchor_price, pos.dca_level) {
                    if pos.dca_level < ctx.max_dca_levels {
                        return buy(pos.next_buy_size, price, ctx);
                    }
                    return sell_all(pos, price, ExitReason::ForcedStopOut);
                }
                Decision::Hold
            }
            PositionStatus::Trailing => {
                let stop = TrailingStop::new(ctx.trailing_stop);
                if price > pos.peak_price {
                    let mut raised = pos.clone();
                    raised.peak_price = TrailingStop::ratchet(pos.peak_price, price);
                    Decision::Update(raised)
                } else if stop.is_triggered(pos.peak_price, price) {
                    sell_all(pos, price, ExitReason::TakeProfit)
                } else if signals.exit {
                    sell_all(pos, price, ExitReason::IndicatorExit)
                } else {
                    Decision::Hold
                }
            }
        }
    }

    /// Evaluate, apply order-free updates immediately, and return the trade
    /// still to be realized (`NoOp` when there is none).
    pub fn step(&mut self, price: f64, signals: Signals, ctx: &StrategyContext) -> Action {
        match self.evaluate(price, signals, ctx) {
            Decision::Hold => Action::NoOp,
            Decision::Update(next) => {
                self.position = next;
                Action::NoOp
            }
            Decision::Trade(action) => action,
        }
    }

    /// Commit a realized trade using the actual fill.
    pub fn confirm(&mut self, action: &Action, fill: &Fill, ctx: &StrategyContext) {
        if !(fill.quantity > 0.0 && fill.price > 0.0) {
            return;
        }
        match action {
            Action::NoOp => {}
            Action::Buy { .. } => {
                if self.position.is_flat() {
                    self.position =
                        Position::opened(fill.price, fill.quantity, ctx.dca_size_at_level(1));
                } else {
                    let pos = &mut self.position;
                    if pos.anchor_price <= 0.0 {
                        pos.anchor_price = pos.entry_price;
                    }
                    pos.average_in(fill.price, fill.quantity);
                    pos.dca_level += 1;
                    pos.next_buy_size *= ctx.dca_size_multiplier;
                }
            }
            Action::Sell { .. } => {
                let remaining = ctx.round_quantity(self.position.quantity - fill.quantity);
                if remaining <= 0.0 {
                    self.position = Position::flat();
                } else {
                    self.position.quantity = remaining;
                }
            }
        }
    }

    /// Position after `action` if it filled in full at its quoted price.
    pub fn preview(&self, action: &Action, ctx: &StrategyContext) -> Position {
        let price = match action {
            Action::NoOp => return self.position.clone(),
            Action::Buy { price, .. } | Action::Sell { price, .. } => *price,
        };
        let fill = Fill {
            price,
            quantity: action.quantity(),
            fee: ctx.fee_on(action.notional()),
            timestamp: DateTime::<Utc>::default(),
        };
        let mut next = self.clone();
        next.confirm(action, &fill, ctx);
        next.position
    }
}

fn buy(notional: f64, price: f64, ctx: &StrategyContext) -> Decision {
    let quantity = ctx.round_quantity(notional / price);
    if quantity > 0.0 {
        Decision::Trade(Action::Buy { quantity, price })
    } else {
        Decision::Hold
    }
}

fn sell_all(pos: &Position, price: f64, reason: ExitReason) -> Decision {
    Decision::Trade(Action::Sell {
        quantity: pos.quantity,
        price,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> StrategyContext {
        StrategyContext {
            base_investment: 100.0,
            max_dca_levels: 3,
            take_profit: 0.05,
            trailing_stop: 0.03,
            dca_drop_trigger: 0.05,
            dca_size_multiplier: 1.0,
            rsi_period: 14,
            rsi_threshold: 30.0,
            fee_rate: 0.001,
            quantity_precision: 6,
        }
    }

    fn fill_for(action: &Action) -> Fill {
        let price = match action {
            Action::Buy { price, .. } | Action::Sell { price, .. } => *price,
            Action::NoOp => 0.0,
        };
        Fill {
            price,
            quantity: action.quantity(),
            fee: 0.0,
            timestamp: DateTime::<Utc>::default(),
        }
    }

    const ENTRY: Signals = Signals {
        entry: true,
        exit: false,
    };
    const EXIT: Signals = Signals {
        entry: false,
        exit: true,
    };

    fn holding_at(entry: f64, quantity: f64) -> PositionStateMachine {
        PositionStateMachine::with_position(Position::opened(entry, quantity, 100.0))
    }

    #[test]
    fn flat_without_entry_holds() {
        let sm = PositionStateMachine::new();
        assert_eq!(sm.evaluate(100.0, Signals::NONE, &ctx()), Decision::Hold);
    }

    #[test]
    fn flat_entry_buys_base_investment() {
        let sm = PositionStateMachine::new();
        assert_eq!(
            sm.evaluate(50.0, ENTRY, &ctx()),
            Decision::Trade(Action::Buy {
                quantity: 2.0,
                price: 50.0
            })
        );
    }

    #[test]
    fn dust_sized_buy_is_skipped() {
        let mut c = ctx();
        c.quantity_precision = 0;
        let sm = PositionStateMachine::new();
        // 100 / 150 rounds down to 0 whole units
        assert_eq!(sm.evaluate(150.0, ENTRY, &c), Decision::Hold);
    }

    #[test]
    fn invalid_price_holds() {
        let sm = holding_at(100.0, 1.0);
        assert_eq!(sm.evaluate(f64::NAN, EXIT, &ctx()), Decision::Hold);
        assert_eq!(sm.evaluate(0.0, EXIT, &ctx()), Decision::Hold);
    }

    #[test]
    fn take_profit_beats_exit_signal() {
        let sm = holding_at(100.0, 1.0);
        match sm.evaluate(106.0, EXIT, &ctx()) {
            Decision::Update(pos) => {
                assert_eq!(pos.status, PositionStatus::Trailing);
                assert_eq!(pos.peak_price, 106.0);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn exit_signal_sells_holding() {
        let sm = holding_at(100.0, 1.5);
        assert_eq!(
            sm.evaluate(101.0, EXIT, &ctx()),
            Decision::Trade(Action::Sell {
                quantity: 1.5,
                price: 101.0,
                reason: ExitReason::IndicatorExit
            })
        );
    }

    #[test]
    fn dca_trigger_compounds_with_level() {
        let c = ctx();
        let mut sm = holding_at(100.0, 1.0);
        // level 1: trigger at 95
        assert_eq!(sm.evaluate(95.5, Signals::NONE, &c), Decision::Hold);
        let action = sm.step(95.0, Signals::NONE, &c);
        assert!(matches!(action, Action::Buy { .. }));
        sm.confirm(&action, &fill_for(&action), &c);
        assert_eq!(sm.position().dca_level, 2);
        assert_eq!(sm.position().anchor_price, 100.0);

        // level 2: trigger at 90, measured from the anchor
        assert_eq!(sm.evaluate(92.0, Signals::NONE, &c), Decision::Hold);
        assert!(matches!(
            sm.evaluate(90.0, Signals::NONE, &c),
            Decision::Trade(Action::Buy { .. })
        ));
    }

    #[test]
    fn dca_add_uses_weighted_average() {
        let c = ctx();
        let mut sm = holding_at(100.0, 1.0);
        let action = Action::Buy {
            quantity: 3.0,
            price: 80.0,
        };
        sm.confirm(&action, &fill_for(&action), &c);
        // (100*1 + 80*3) / 4 = 85
        assert!((sm.position().entry_price - 85.0).abs() < 1e-12);
        assert_eq!(sm.position().quantity, 4.0);
    }

    #[test]
    fn next_buy_size_grows_with_multiplier() {
        let mut c = ctx();
        c.dca_size_multiplier = 2.0;
        let mut sm = PositionStateMachine::new();
        let entry = sm.step(100.0, ENTRY, &c);
        sm.confirm(&entry, &fill_for(&entry), &c);
        assert_eq!(sm.position().next_buy_size, 200.0);

        let add = sm.step(95.0, Signals::NONE, &c);
        assert_eq!(
            add,
            Action::Buy {
                quantity: ctx().round_quantity(200.0 / 95.0),
                price: 95.0
            }
        );
        sm.confirm(&add, &fill_for(&add), &c);
        assert_eq!(sm.position().next_buy_size, 400.0);
    }

    #[test]
    fn exhausted_levels_force_stop_out() {
        let c = ctx();
        let mut pos = Position::opened(100.0, 1.0, 100.0);
        pos.dca_level = 3;
        let sm = PositionStateMachine::with_position(pos);
        // level 3 trigger sits at 85
        assert_eq!(sm.evaluate(86.0, Signals::NONE, &c), Decision::Hold);
        assert!(matches!(
            sm.evaluate(84.0, Signals::NONE, &c),
            Decision::Trade(Action::Sell {
                reason: ExitReason::ForcedStopOut,
                ..
            })
        ));
    }

    #[test]
    fn trailing_raises_peak_then_exits() {
        let c = ctx();
        let mut sm = holding_at(100.0, 1.0);
        assert!(sm.step(106.0, Signals::NONE, &c).is_noop());
        assert!(sm.step(110.0, Signals::NONE, &c).is_noop());
        assert_eq!(sm.position().peak_price, 110.0);
        assert!(sm.step(108.0, Signals::NONE, &c).is_noop());
        assert_eq!(sm.position().peak_price, 110.0);

        let action = sm.step(106.5, Signals::NONE, &c);
        assert!(matches!(
            action,
            Action::Sell {
                reason: ExitReason::TakeProfit,
                ..
            }
        ));
        sm.confirm(&action, &fill_for(&action), &c);
        assert!(sm.position().is_flat());
    }

    #[test]
    fn trailing_exit_signal_sells() {
        let mut pos = Position::opened(100.0, 1.0, 100.0);
        pos.status = PositionStatus::Trailing;
        pos.peak_price = 110.0;
        let sm = PositionStateMachine::with_position(pos);
        assert!(matches!(
            sm.evaluate(109.0, EXIT, &ctx()),
            Decision::Trade(Action::Sell {
                reason: ExitReason::IndicatorExit,
                ..
            })
        ));
    }

    #[test]
    fn evaluate_does_not_mutate() {
        let sm = holding_at(100.0, 1.0);
        let before = sm.clone();
        let _ = sm.evaluate(120.0, Signals::NONE, &ctx());
        let _ = sm.evaluate(50.0, EXIT, &ctx());
        assert_eq!(sm, before);
    }

    #[test]
    fn partial_sell_keeps_remainder() {
        let c = ctx();
        let mut sm = holding_at(100.0, 2.0);
        let action = Action::Sell {
            quantity: 2.0,
            price: 90.0,
            reason: ExitReason::IndicatorExit,
        };
        let mut fill = fill_for(&action);
        fill.quantity = 1.5;
        sm.confirm(&action, &fill, &c);
        assert_eq!(sm.position().status, PositionStatus::Holding);
        assert!((sm.position().quantity - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_fill_commits_nothing() {
        let c = ctx();
        let mut sm = PositionStateMachine::new();
        let action = Action::Buy {
            quantity: 1.0,
            price: 100.0,
        };
        let mut fill = fill_for(&action);
        fill.quantity = 0.0;
        sm.confirm(&action, &fill, &c);
        assert!(sm.position().is_flat());
    }

    #[test]
    fn preview_matches_confirm() {
        let c = ctx();
        let sm = PositionStateMachine::new();
        let action = sm.clone().step(100.0, ENTRY, &c);
        let previewed = sm.preview(&action, &c);
        assert_eq!(previewed.status, PositionStatus::Holding);
        assert_eq!(previewed.dca_level, 1);
        assert_eq!(previewed.entry_price, 100.0);
        assert!(sm.position().is_flat());
    }
}
