//! Price source trait and structured fetch errors.
//!
//! The PriceSource trait abstracts over where candles come from (the Binance
//! REST API, a replay file, a test double) so the pipeline can be driven and
//! mocked without a network.

use thiserror::Error;

use crate::domain::PriceBar;

/// Why a fetch produced no usable bars. Every variant skips the cycle; none
/// changes position state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    Unreachable(String),

    #[error("rate limited by exchange (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("exchange error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("hard stop: exchange requests blocked (circuit breaker open)")]
    CircuitOpen,
}

/// Source of recent closed (and forming) candles for a symbol.
pub trait PriceSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Up to `limit` most recent bars, oldest first.
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<PriceBar>, FetchError>;
}
