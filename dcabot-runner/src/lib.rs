//! DCABot Runner: everything that touches the outside world.
//!
//! - Binance REST client (klines, signed market orders, balances)
//! - Circuit breaker shared by the client's request paths
//! - Per-symbol pipeline running one decision cycle
//! - JSON position store and CSV trade journal
//! - The polling bot loop

pub mod bot;
pub mod exchange;
pub mod journal;
pub mod pipeline;
pub mod store;

pub use bot::{Bot, BotError, SymbolReport};
pub use pipeline::{CycleOutcome, Strategy, SymbolPipeline};

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<exchange::CircuitBreaker>();
        require_sync::<exchange::CircuitBreaker>();
        require_send::<exchange::BinanceClient>();
        require_sync::<exchange::BinanceClient>();
        require_send::<SymbolPipeline>();
        require_sync::<SymbolPipeline>();
        require_send::<CycleOutcome>();
        require_sync::<CycleOutcome>();
        require_send::<store::PositionStore>();
        require_send::<journal::TradeJournal>();
    }
}
