/// Percent trailing stop measured from the peak price.
///
/// **Core Rule:** the peak only ratchets upward, so the stop level derived
/// from it can tighten but never loosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingStop {
    /// Fraction of the peak given back before exiting (e.g. 0.03 = 3%).
    fraction: f64,
}

impl TrailingStop {
    /// Any fraction is accepted; one of 1 or more never triggers on a
    /// positive price.
    pub fn new(fraction: f64) -> Self {
        Self { fraction }
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Ratchet the peak: returns the higher of the current and observed price.
    pub fn ratchet(current_peak: f64, price: f64) -> f64 {
        current_peak.max(price)
    }

    /// Exit level for the given peak.
    pub fn stop_price(&self, peak: f64) -> f64 {
        peak * (1.0 - self.fraction)
    }

    /// Relative give-back from the peak; negative above the peak.
    pub fn drawdown(peak: f64, price: f64) -> f64 {
        if peak <= 0.0 {
            return 0.0;
        }
        (peak - price) / peak
    }

    pub fn is_triggered(&self, peak: f64, price: f64) -> bool {
        peak > 0.0 && Self::drawdown(peak, price) >= self.fraction
    }
}
