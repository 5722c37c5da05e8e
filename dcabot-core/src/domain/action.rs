//! Action: what the state machine asks the order collaborator to realize.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::order::OrderSide;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Trailing stop fired after the take-profit was armed.
    TakeProfit,
    /// Price kept falling after every DCA level was used.
    ForcedStopOut,
    /// An exit-gating indicator turned bearish.
    IndicatorExit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::TakeProfit => "take_profit",
            ExitReason::ForcedStopOut => "forced_stop_out",
            ExitReason::IndicatorExit => "indicator_exit",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    NoOp,
    Buy {
        quantity: f64,
        price: f64,
    },
    Sell {
        quantity: f64,
        price: f64,
        reason: ExitReason,
    },
}

impl Action {
    pub fn is_noop(&self) -> bool {
        matches!(self, Action::NoOp)
    }

    pub fn side(&self) -> Option<OrderSide> {
        match self {
            Action::NoOp => None,
            Action::Buy { .. } => Some(OrderSide::Buy),
            Action::Sell { .. } => Some(OrderSide::Sell),
        }
    }

    pub fn quantity(&self) -> f64 {
        match self {
            Action::NoOp => 0.0,
            Action::Buy { quantity, .. } | Action::Sell { quantity, .. } => *quantity,
        }
    }

    /// Quote notional at the decision price.
    pub fn notional(&self) -> f64 {
        match self {
            Action::NoOp => 0.0,
            Action::Buy { quantity, price } | Action::Sell { quantity, price, .. } => {
                quantity * price
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_has_no_side() {
        assert!(Action::NoOp.is_noop());
        assert_eq!(Action::NoOp.side(), None);
        assert_eq!(Action::NoOp.notional(), 0.0);
    }

    #[test]
    fn sell_exposes_side_and_notional() {
        let action = Action::Sell {
            quantity: 2.0,
            price: 50.0,
            reason: ExitReason::TakeProfit,
        };
        assert_eq!(action.side(), Some(OrderSide::Sell));
        assert_eq!(action.quantity(), 2.0);
        assert_eq!(action.notional(), 100.0);
    }

    #[test]
    fn action_serializes_with_tag() {
        let action = Action::Buy {
            quantity: 1.0,
            price: 10.0,
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains(r#""type":"buy""#));
    }
}
