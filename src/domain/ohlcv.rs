//! OHLCV price bar representation and input validation.

use chrono::{DateTime, Utc};

use super::error::LevtraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Extract the close series used by the indicator functions.
pub fn closes(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Check that a bar sequence is usable as backtest input.
///
/// Timestamps must be unique and strictly increasing, prices positive and
/// finite, `low <= open, close <= high`, and volume non-negative. Gaps
/// between timestamps are allowed.
pub fn validate_bars(bars: &[OhlcvBar]) -> Result<(), LevtraderError> {
    for (index, bar) in bars.iter().enumerate() {
        let invalid = |reason: String| LevtraderError::InvalidBar { index, reason };

        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(invalid("prices must be positive and finite".into()));
        }
        if bar.low > bar.open.min(bar.close) || bar.high < bar.open.max(bar.close) {
            return Err(invalid(format!(
                "open/close outside low-high range (o={} h={} l={} c={})",
                bar.open, bar.high, bar.low, bar.close
            )));
        }
        if !bar.volume.is_finite() || bar.volume < 0.0 {
            return Err(invalid("volume must be non-negative".into()));
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(invalid(format!(
                "timestamp {} not strictly increasing",
                bar.timestamp
            )));
        }
    }
    Ok(())
}
