//! Technical indicators over a close-price series.
//!
//! Every function is pure and returns one entry per input value. Entries
//! inside an indicator's warmup window are `None`.

pub mod cluster;
pub mod ema;
pub mod macd;
pub mod sma;

pub use cluster::{ClusterAnalysis, RETEST_TOLERANCE};
pub use ema::calculate_ema;
pub use macd::{MacdPoint, calculate_macd, macd_cross};
pub use sma::calculate_sma;

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    /// Value at `index`, `None` during warmup or past the end.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }
}

/// Direction of a crossing event (breakout, retest or MACD cross).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "SMA(20)");
        assert_eq!(IndicatorType::Ema(12).to_string(), "EMA(12)");
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn series_get_flattens_warmup() {
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Sma(2),
            values: vec![None, Some(1.5)],
        };
        assert_eq!(series.get(0), None);
        assert_eq!(series.get(1), Some(1.5));
        assert_eq!(series.get(5), None);
    }
}
