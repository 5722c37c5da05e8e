//! PositionBook: every symbol's position, persisted as one JSON object.
//!
//! Layout: `{ "<SYMBOL>": { "status", "entry_price", "quantity", "dca_level",
//! "anchor_price", "peak_price", "next_buy_size" }, ... }`. Flat positions are
//! not written; a symbol missing from the file is flat. Records that only
//! carry `entry_price`, `quantity` and `dca_level` load as `Holding` and are
//! completed by `normalize`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::StrategyContext;
use crate::domain::{Position, PositionStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionBook {
    positions: BTreeMap<String, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position for `symbol`, flat when unknown.
    pub fn get(&self, symbol: &str) -> Position {
        self.positions.get(symbol).cloned().unwrap_or_default()
    }

    /// Record a position; flat positions are removed.
    pub fn set(&mut self, symbol: &str, position: Position) {
        if position.is_flat() {
            self.positions.remove(symbol);
        } else {
            self.positions.insert(symbol.to_string(), position);
        }
    }

    /// Open positions in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Position)> {
        self.positions.iter().map(|(s, p)| (s.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Complete records written by older versions and drop empty ones.
    ///
    /// Missing anchor or peak prices fall back to the entry price; a missing
    /// `next_buy_size` is the DCA size for the record's level. Returns how
    /// many records were changed.
    pub fn normalize(&mut self, ctx: &StrategyContext) -> usize {
        let before = self.positions.len();
        self.positions
            .retain(|_, p| p.quantity.is_finite() && p.quantity > 0.0);
        let mut changed = before - self.positions.len();

        for position in self.positions.values_mut() {
            let mut touched = false;
            if position.status == PositionStatus::Flat {
                position.status = PositionStatus::Holding;
                touched = true;
            }
            if position.anchor_price <= 0.0 {
                position.anchor_price = position.entry_price;
                touched = true;
            }
            if position.peak_price <= 0.0 {
                position.peak_price = position.entry_price;
                touched = true;
            }
            if position.next_buy_size <= 0.0 {
                position.next_buy_size = ctx.dca_size_at_level(position.dca_level);
                touched = true;
            }
            if touched {
                changed += 1;
            }
        }
        changed
    }
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
            dca_size_multiplier: 1.5,
            rsi_period: 14,
            rsi_threshold: 30.0,
            fee_rate: 0.001,
            quantity_precision: 6,
        }
    }

    #[test]
    fn unknown_symbol_is_flat() {
        let book = PositionBook::new();
        assert!(book.get("BTCUSDT").is_flat());
    }

    #[test]
    fn set_flat_removes_entry() {
        let mut book = PositionBook::new();
        book.set("BTCUSDT", Position::opened(100.0, 1.0, 100.0));
        assert_eq!(book.len(), 1);
        book.set("BTCUSDT", Position::flat());
        assert!(book.is_empty());
    }

    #[test]
    fn json_roundtrip_is_exact() {
        let mut book = PositionBook::new();
        let mut pos = Position::opened(64_123.456789, 0.001559, 150.0);
        pos.average_in(60_000.1, 0.0025);
        pos.dca_level = 2;
        book.set("BTCUSDT", pos);
        let mut trailing = Position::opened(3_100.0, 0.05, 150.0);
        trailing.status = PositionStatus::Trailing;
        trailing.peak_price = 3_333.33;
        book.set("ETHUSDT", trailing);

        let restored = PositionBook::from_json(&book.to_json().unwrap()).unwrap();
        assert_eq!(restored, book);
    }

    #[test]
    fn legacy_records_load_as_holding() {
        let json = r#"{
            "BTCUSDT": {"entry_price": 100.0, "quantity": 1.0, "dca_level": 0},
            "ETHUSDT": {"entry_price": 2000.0, "quantity": 0.0, "dca_level": 0}
        }"#;
        let mut book = PositionBook::from_json(json).unwrap();
        let changed = book.normalize(&ctx());
        assert_eq!(changed, 2);
        assert_eq!(book.len(), 1);

        let btc = book.get("BTCUSDT");
        assert_eq!(btc.status, PositionStatus::Holding);
        assert_eq!(btc.anchor_price, 100.0);
        assert_eq!(btc.peak_price, 100.0);
        assert_eq!(btc.next_buy_size, 100.0);
        assert!(book.get("ETHUSDT").is_flat());
    }

    #[test]
    fn normalize_keeps_complete_records() {
        let mut book = PositionBook::new();
        book.set("BTCUSDT", Position::opened(100.0, 1.0, 150.0));
        assert_eq!(book.normalize(&ctx()), 0);
    }

    #[test]
    fn written_layout_is_keyed_by_symbol() {
        let mut book = PositionBook::new();
        book.set("BTCUSDT", Position::opened(100.0, 1.0, 150.0));
        let value: serde_json::Value = serde_json::from_str(&book.to_json().unwrap()).unwrap();
        let record = &value["BTCUSDT"];
        assert_eq!(record["status"], "holding");
        assert_eq!(record["entry_price"], 100.0);
        assert_eq!(record["dca_level"], 1);
    }
}
