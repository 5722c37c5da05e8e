//! One symbol's decision cycle.
//!
//! fetch → merge into window → indicators → signals → decide → submit → commit
//!
//! A failed fetch skips the cycle; a failed order leaves the position as it
//! was. Only a confirmed fill moves the state machine across a trade.

use tracing::{debug, info, warn};

use dcabot_core::config::{BotConfig, StrategyContext};
use dcabot_core::data::{FetchError, PriceSource};
use dcabot_core::domain::{Action, Fill, Position, PriceWindow};
use dcabot_core::execution::{OrderError, OrderGateway};
use dcabot_core::position_management::PositionStateMachine;
use dcabot_core::signals::{evaluate, IndicatorSuite, Signals};

/// Settings shared by every symbol's pipeline.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub suite: IndicatorSuite,
    pub ctx: StrategyContext,
    pub interval: String,
    pub quote_asset: String,
}

impl Strategy {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            suite: IndicatorSuite::from_config(config),
            ctx: config.strategy_context(),
            interval: config.interval.clone(),
            quote_asset: config.base_currency.clone(),
        }
    }
}

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No usable prices; nothing evaluated.
    Skipped(FetchError),
    /// Evaluated, nothing to do.
    Idle { price: f64, signals: Signals },
    /// Order-free state change (trailing armed or peak raised).
    Updated { price: f64, position: Position },
    /// Buy skipped: the quote balance cannot cover notional plus fee.
    InsufficientBalance { required: f64, available: f64 },
    /// The order collaborator failed; state unchanged.
    OrderFailed { action: Action, error: OrderError },
    /// Trade realized and committed.
    Executed { action: Action, fill: Fill },
}

#[derive(Debug, Clone)]
pub struct SymbolPipeline {
    symbol: String,
    window: PriceWindow,
    machine: PositionStateMachine,
}

impl SymbolPipeline {
    /// Window capacity follows the suite so every enabled indicator can warm up.
    pub fn new(symbol: impl Into<String>, suite: &IndicatorSuite, position: Position) -> Self {
        Self {
            symbol: symbol.into(),
            window: PriceWindow::new(suite.required_bars()),
            machine: PositionStateMachine::with_position(position),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn position(&self) -> &Position {
        self.machine.position()
    }

    pub fn window(&self) -> &PriceWindow {
        &self.window
    }

    pub fn run_cycle(
        &mut self,
        source: &dyn PriceSource,
        gateway: &mut dyn OrderGateway,
        strategy: &Strategy,
    ) -> CycleOutcome {
        let symbol = self.symbol.as_str();

        let bars = match source.fetch_bars(symbol, &strategy.interval, self.window.capacity()) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol, source = source.name(), error = %e, "fetch failed; skipping cycle");
                return CycleOutcome::Skipped(e);
            }
        };
        if let Err(e) = self.window.merge(&bars) {
            warn!(symbol, error = %e, "rejected price batch; skipping cycle");
            return CycleOutcome::Skipped(FetchError::Malformed(e.to_string()));
        }
        let Some(price) = self.window.latest().map(|b| b.close) else {
            warn!(symbol, "no bars yet; skipping cycle");
            return CycleOutcome::Skipped(FetchError::Malformed("empty kline batch".into()));
        };
        gateway.observe_price(symbol, price);

        let snapshot = strategy.suite.snapshot(&self.window);
        let signals = evaluate(&snapshot, strategy.ctx.rsi_threshold, &strategy.suite);
        debug!(
            symbol,
            price,
            rsi = ?snapshot.rsi_value(),
            macd = ?snapshot.macd,
            alligator = ?snapshot.alligator,
            entry = signals.entry,
            exit = signals.exit,
            "indicators"
        );

        let before = self.machine.position().clone();
        let action = self.machine.step(price, signals, &strategy.ctx);

        if action.is_noop() {
            let position = self.machine.position();
            if *position != before {
                info!(
                    symbol,
                    price,
                    status = ?position.status,
                    peak = position.peak_price,
                    "position updated"
                );
                return CycleOutcome::Updated {
                    price,
                    position: position.clone(),
                };
            }
            return CycleOutcome::Idle { price, signals };
        }

        if let Action::Buy { .. } = action {
            let required = action.notional() * (1.0 + strategy.ctx.fee_rate);
            match gateway.quote_balance(&strategy.quote_asset) {
                Ok(Some(available)) if required > available => {
                    warn!(
                        symbol,
                        required,
                        available,
                        asset = %strategy.quote_asset,
                        "insufficient balance; buy skipped"
                    );
                    return CycleOutcome::InsufficientBalance {
                        required,
                        available,
                    };
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(symbol, %error, "balance check failed; buy skipped");
                    return CycleOutcome::OrderFailed { action, error };
                }
            }
        }

        let Some(side) = action.side() else {
            return CycleOutcome::Idle { price, signals };
        };
        match gateway.submit_market_order(symbol, side, action.quantity()) {
            Ok(fill) => {
                self.machine.confirm(&action, &fill, &strategy.ctx);
                let position = self.machine.position();
                info!(
                    symbol,
                    %side,
                    quantity = fill.quantity,
                    price = fill.price,
                    fee = fill.fee,
                    status = ?position.status,
                    dca_level = position.dca_level,
                    entry_price = position.entry_price,
                    "order filled"
                );
                CycleOutcome::Executed { action, fill }
            }
            Err(error) => {
                warn!(symbol, %side, quantity = action.quantity(), %error, "order failed; state unchanged");
                CycleOutcome::OrderFailed { action, error }
            }
        }
    }
}
