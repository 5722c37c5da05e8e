use serde::{Deserialize, Serialize};

/// Lifecycle stage of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    #[default]
    Flat,
    /// Long, waiting for take-profit or adding on drops.
    Holding,
    /// Take-profit crossed; exits on a pullback from the peak.
    Trailing,
}

/// Per-symbol position state.
///
/// `quantity` is 0 iff `status` is `Flat`; the price fields are 0 while flat.
/// Records written before `status`, `anchor_price`, `peak_price` and
/// `next_buy_size` existed deserialize with `Holding` and zeros, which
/// `PositionBook` fills in from the entry price and strategy context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default = "legacy_status")]
    pub status: PositionStatus,
    /// Quantity-weighted average fill price.
    pub entry_price: f64,
    pub quantity: f64,
    /// Number of buy fills in the current cycle (entry counts as 1).
    pub dca_level: u32,
    /// First fill price of the cycle; DCA triggers are measured from it.
    #[serde(default)]
    pub anchor_price: f64,
    /// Highest observed price; ratchets upward while trailing.
    #[serde(default)]
    pub peak_price: f64,
    /// Quote notional of the next DCA add.
    #[serde(default)]
    pub next_buy_size: f64,
}

fn legacy_status() -> PositionStatus {
    PositionStatus::Holding
}

impl Default for Position {
    fn default() -> Self {
        Self::flat()
    }
}

impl Position {
    pub fn flat() -> Self {
        Self {
            status: PositionStatus::Flat,
            entry_price: 0.0,
            quantity: 0.0,
            dca_level: 0,
            anchor_price: 0.0,
            peak_price: 0.0,
            next_buy_size: 0.0,
        }
    }

    /// First fill of a cycle.
    pub fn opened(price: f64, quantity: f64, next_buy_size: f64) -> Self {
        Self {
            status: PositionStatus::Holding,
            entry_price: price,
            quantity,
            dca_level: 1,
            anchor_price: price,
            peak_price: price,
            next_buy_size,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.status == PositionStatus::Flat
    }

    /// Fold another buy fill into the quantity-weighted entry price.
    pub fn average_in(&mut self, price: f64, quantity: f64) {
        let total = self.quantity + quantity;
        if total <= 0.0 {
            return;
        }
        self.entry_price = (self.entry_price * self.quantity + price * quantity) / total;
        self.quantity = total;
    }

    /// Raise the peak; never lowers it.
    pub fn observe_peak(&mut self, price: f64) {
        self.peak_price = self.peak_price.max(price);
    }

    pub fn cost_basis(&self) -> f64 {
        self.entry_price * self.quantity
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.quantity * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.quantity * (current_price - self.entry_price)
    }
}
