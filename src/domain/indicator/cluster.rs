//! Moving-average cluster detection.
//!
//! A cluster forms when several simple moving averages converge: the spread
//! between the highest and lowest average, relative to price, falls under a
//! threshold. Price leaving the cluster band is a breakout.

use super::{Direction, calculate_sma};

/// Allowed overshoot of the band during a retest, as a fraction of the band.
pub const RETEST_TOLERANCE: f64 = 0.005;

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAnalysis {
    /// Highest moving average per bar.
    pub upper: Vec<Option<f64>>,
    /// Lowest moving average per bar.
    pub lower: Vec<Option<f64>>,
    /// upper - lower, only when at least two averages are out of warmup.
    pub width: Vec<Option<f64>>,
    pub in_cluster: Vec<bool>,
    pub breakout: Vec<Option<Direction>>,
}

impl ClusterAnalysis {
    pub fn compute(values: &[f64], periods: &[usize], threshold: f64) -> Self {
        let averages: Vec<_> = periods.iter().map(|&p| calculate_sma(values, p)).collect();
        let n = values.len();

        let mut upper = Vec::with_capacity(n);
        let mut lower = Vec::with_capacity(n);
        let mut width = Vec::with_capacity(n);
        let mut in_cluster = Vec::with_capacity(n);

        for (i, price) in values.iter().enumerate() {
            let valid: Vec<f64> = averages.iter().filter_map(|s| s.get(i)).collect();
            let hi = valid.iter().copied().reduce(f64::max);
            let lo = valid.iter().copied().reduce(f64::min);
            let w = match (hi, lo) {
                (Some(h), Some(l)) if valid.len() >= 2 => Some(h - l),
                _ => None,
            };

            upper.push(hi);
            lower.push(lo);
            width.push(w);
            in_cluster.push(w.is_some_and(|w| w / price <= threshold));
        }

        let mut breakout = vec![None; n];
        for i in 1..n {
            if !in_cluster[i - 1] {
                continue;
            }
            let (price, prev) = (values[i], values[i - 1]);

            let crossed_up = matches!(
                (upper[i], upper[i - 1]),
                (Some(u), Some(pu)) if price > u && prev <= pu
            );
            let crossed_down = matches!(
                (lower[i], lower[i - 1]),
                (Some(l), Some(pl)) if price < l && prev >= pl
            );

            breakout[i] = if crossed_up {
                Some(Direction::Up)
            } else if crossed_down {
                Some(Direction::Down)
            } else {
                None
            };
        }

        ClusterAnalysis {
            upper,
            lower,
            width,
            in_cluster,
            breakout,
        }
    }

    /// Retest confirmation at `index` of a breakout `retest_periods` bars earlier.
    ///
    /// After an upward breakout, price must hold above the band (within
    /// `RETEST_TOLERANCE`) for the whole window and close above it at
    /// `index`. Downward breakouts mirror this against the lower band.
    pub fn retest(&self, values: &[f64], index: usize, retest_periods: usize) -> Option<Direction> {
        if index < retest_periods || index >= values.len() {
            return None;
        }
        let start = index - retest_periods;
        let prices = &values[start..=index];
        let price = values[index];

        match self.breakout[start]? {
            Direction::Up => {
                let band_min = self.upper[start..=index]
                    .iter()
                    .flatten()
                    .copied()
                    .reduce(f64::min)?;
                let price_min = prices.iter().copied().reduce(f64::min)?;
                let current = self.upper[index]?;
                (price_min >= band_min * (1.0 - RETEST_TOLERANCE) && price > current)
                    .then_some(Direction::Up)
            }
            Direction::Down => {
                let band_max = self.lower[start..=index]
                    .iter()
                    .flatten()
                    .copied()
                    .reduce(f64::max)?;
                let price_max = prices.iter().copied().reduce(f64::max)?;
                let current = self.lower[index]?;
                (price_max <= band_max * (1.0 + RETEST_TOLERANCE) && price < current)
                    .then_some(Direction::Down)
            }
        }
    }
}
