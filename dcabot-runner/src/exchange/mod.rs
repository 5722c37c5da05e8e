//! Binance spot REST client and its circuit breaker.

pub mod binance;
pub mod circuit_breaker;

pub use binance::{BinanceClient, BINANCE_BASE_URL, BINANCE_TESTNET_URL};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
