//! Paper gateway: simulated market fills against a quote balance.
//!
//! Market orders fill in full at the last observed price, adjusted by a fixed
//! slippage in basis points (buys pay up, sells receive less). The fee is
//! `fee_rate` of the fill notional and is charged in the quote asset.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};

use crate::domain::{Fill, OrderSide};

use super::gateway::{OrderError, OrderGateway};

/// One simulated execution, kept for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperTrade {
    pub symbol: String,
    pub side: OrderSide,
    pub fill: Fill,
}

#[derive(Debug, Clone)]
pub struct PaperGateway {
    quote_asset: String,
    quote_balance: f64,
    fee_rate: f64,
    slippage_bps: f64,
    marks: HashMap<String, f64>,
    holdings: BTreeMap<String, f64>,
    trades: Vec<PaperTrade>,
}

impl PaperGateway {
    pub fn new(quote_asset: impl Into<String>, quote_balance: f64, fee_rate: f64) -> Self {
        Self {
            quote_asset: quote_asset.into(),
            quote_balance,
            fee_rate,
            slippage_bps: 0.0,
            marks: HashMap::new(),
            holdings: BTreeMap::new(),
            trades: Vec::new(),
        }
    }

    /// Slippage in basis points (e.g., 5 = 0.05%).
    pub fn with_slippage_bps(mut self, bps: f64) -> Self {
        self.slippage_bps = bps;
        self
    }

    pub fn balance(&self) -> f64 {
        self.quote_balance
    }

    /// Base-asset quantity bought minus sold, per symbol.
    pub fn holdings(&self) -> &BTreeMap<String, f64> {
        &self.holdings
    }

    pub fn trades(&self) -> &[PaperTrade] {
        &self.trades
    }

    /// Total fees charged so far.
    pub fn fees_paid(&self) -> f64 {
        self.trades.iter().map(|t| t.fill.fee).sum()
    }

    fn fill_price(&self, mark: f64, side: OrderSide) -> f64 {
        let slip = mark * self.slippage_bps / 10_000.0;
        match side {
            OrderSide::Buy => mark + slip,
            OrderSide::Sell => mark - slip,
        }
    }
}

impl OrderGateway for PaperGateway {
    fn name(&self) -> &str {
        "paper"
    }

    fn observe_price(&mut self, symbol: &str, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.marks.insert(symbol.to_string(), price);
        }
    }

    fn submit_market_order(
        &mut self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> Result<Fill, OrderError> {
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(OrderError::Rejected(format!(
                "invalid quantity {quantity} for {symbol}"
            )));
        }
        let mark = *self
            .marks
            .get(symbol)
            .ok_or_else(|| OrderError::Rejected(format!("no price observed for {symbol}")))?;

        let price = self.fill_price(mark, side);
        let notional = price * quantity;
        let fee = notional * self.fee_rate;

        match side {
            OrderSide::Buy => {
                let required = notional + fee;
                if required > self.quote_balance {
                    return Err(OrderError::InsufficientBalance {
                        asset: self.quote_asset.clone(),
                        required,
                        available: self.quote_balance,
                    });
                }
                self.quote_balance -= required;
                *self.holdings.entry(symbol.to_string()).or_insert(0.0) += quantity;
            }
            OrderSide::Sell => {
                self.quote_balance += notional - fee;
                let held = self.holdings.entry(symbol.to_string()).or_insert(0.0);
                *held = (*held - quantity).max(0.0);
            }
        }

        let fill = Fill {
            price,
            quantity,
            fee,
            timestamp: Utc::now(),
        };
        self.trades.push(PaperTrade {
            symbol: symbol.to_string(),
            side,
            fill: fill.clone(),
        });
        Ok(fill)
    }

    fn quote_balance(&mut self, asset: &str) -> Result<Option<f64>, OrderError> {
        if asset.eq_ignore_ascii_case(&self.quote_asset) {
            Ok(Some(self.quote_balance))
        } else {
            Ok(None)
        }
    }
}
