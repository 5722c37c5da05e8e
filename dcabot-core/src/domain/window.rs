//! PriceWindow: bounded rolling sequence of closes used as indicator input.
//!
//! Timestamps are strictly increasing. When the window is full the oldest bar
//! is evicted. `merge` ingests a batch fetched from the exchange, where the
//! newest kline is usually still forming and gets revised on the next poll.

use std::collections::VecDeque;

use thiserror::Error;

use super::bar::PriceBar;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("invalid close price {close} at {timestamp}")]
    InvalidPrice { timestamp: String, close: f64 },

    #[error("bar at {timestamp} is not after the newest bar at {newest}")]
    OutOfOrder { timestamp: String, newest: String },
}

#[derive(Debug, Clone)]
pub struct PriceWindow {
    bars: VecDeque<PriceBar>,
    capacity: usize,
}

impl PriceWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "window capacity must be >= 1");
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Build a window from raw closes, one bar per minute. Handy for tests and
    /// benches where timestamps carry no meaning.
    pub fn from_closes(capacity: usize, closes: &[f64]) -> Result<Self, WindowError> {
        let base = chrono::DateTime::<chrono::Utc>::default();
        let mut window = Self::new(capacity);
        for (i, &close) in closes.iter().enumerate() {
            window.push(PriceBar::new(
                base + chrono::Duration::minutes(i as i64),
                close,
            ))?;
        }
        Ok(window)
    }

    /// Append a bar strictly newer than the newest one held.
    pub fn push(&mut self, bar: PriceBar) -> Result<(), WindowError> {
        check_price(&bar)?;
        if let Some(newest) = self.bars.back() {
            if bar.timestamp <= newest.timestamp {
                return Err(WindowError::OutOfOrder {
                    timestamp: bar.timestamp.to_rfc3339(),
                    newest: newest.timestamp.to_rfc3339(),
                });
            }
        }
        if self.bars.len() == self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
        Ok(())
    }

    /// Ingest a fetched batch (oldest first).
    ///
    /// Bars older than the newest held bar are skipped, a bar stamped like the
    /// newest one replaces its close, newer bars are appended. The batch is
    /// validated up front so a bad price leaves the window untouched.
    /// Returns the number of bars appended.
    pub fn merge(&mut self, bars: &[PriceBar]) -> Result<usize, WindowError> {
        for bar in bars {
            check_price(bar)?;
        }

        let mut appended = 0;
        for bar in bars {
            match self.bars.back_mut() {
                Some(newest) if bar.timestamp < newest.timestamp => continue,
                Some(newest) if bar.timestamp == newest.timestamp => newest.close = bar.close,
                _ => {
                    if self.bars.len() == self.capacity {
                        self.bars.pop_front();
                    }
                    self.bars.push_back(*bar);
                    appended += 1;
                }
            }
        }
        Ok(appended)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn latest(&self) -> Option<&PriceBar> {
        self.bars.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceBar> {
        self.bars.iter()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.bars.len() == self.capacity
    }
}

fn check_price(bar: &PriceBar) -> Result<(), WindowError> {
    if bar.is_sane() {
        Ok(())
    } else {
        Err(WindowError::InvalidPrice {
            timestamp: bar.timestamp.to_rfc3339(),
            close: bar.close,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bar(minute: i64, close: f64) -> PriceBar {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        PriceBar::new(base + Duration::minutes(minute), close)
    }

    #[test]
    fn push_evicts_oldest_when_full() {
        let mut window = PriceWindow::new(3);
        for i in 0..5 {
            window.push(bar(i, 100.0 + i as f64)).unwrap();
        }
        assert_eq!(window.len(), 3);
        assert!(window.is_full());
        assert_eq!(window.closes(), vec![102.0, 103.0, 104.0]);
    }

    #[test]
    fn push_rejects_stale_timestamp() {
        let mut window = PriceWindow::new(3);
        window.push(bar(5, 100.0)).unwrap();
        let err = window.push(bar(5, 101.0)).unwrap_err();
        assert!(matches!(err, WindowError::OutOfOrder { .. }));
        let err = window.push(bar(4, 101.0)).unwrap_err();
        assert!(matches!(err, WindowError::OutOfOrder { .. }));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn push_rejects_bad_price() {
        let mut window = PriceWindow::new(3);
        assert!(matches!(
            window.push(bar(0, f64::NAN)),
            Err(WindowError::InvalidPrice { .. })
        ));
        assert!(window.is_empty());
    }

    #[test]
    fn merge_revises_forming_bar_and_skips_old() {
        let mut window = PriceWindow::new(5);
        window.merge(&[bar(0, 100.0), bar(1, 101.0)]).unwrap();

        // Next poll: bar 0 again (skipped), bar 1 revised, bar 2 new.
        let appended = window
            .merge(&[bar(0, 99.0), bar(1, 101.5), bar(2, 102.0)])
            .unwrap();
        assert_eq!(appended, 1);
        assert_eq!(window.closes(), vec![100.0, 101.5, 102.0]);
    }

    #[test]
    fn merge_with_invalid_price_leaves_window_unchanged() {
        let mut window = PriceWindow::new(5);
        window.merge(&[bar(0, 100.0)]).unwrap();
        let err = window.merge(&[bar(1, 101.0), bar(2, -3.0)]).unwrap_err();
        assert!(matches!(err, WindowError::InvalidPrice { .. }));
        assert_eq!(window.closes(), vec![100.0]);
    }

    #[test]
    fn from_closes_builds_increasing_timestamps() {
        let window = PriceWindow::from_closes(10, &[1.0, 2.0, 3.0]).unwrap();
        let stamps: Vec<_> = window.iter().map(|b| b.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(window.latest().map(|b| b.close), Some(3.0));
    }
}
