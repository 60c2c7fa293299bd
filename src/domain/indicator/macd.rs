//! MACD (Moving Average Convergence Divergence).
//!
//! DIF = EMA(fast) - EMA(slow)
//! DEA = EMA(signal) of DIF, seeded with the mean of the first `signal` DIF values
//! Histogram = DIF - DEA
//!
//! Warmup: max(fast, slow) - 1 + signal - 1 values.

use super::{Direction, calculate_ema};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub dif: f64,
    pub dea: f64,
    pub histogram: f64,
}

pub fn calculate_macd(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Vec<Option<MacdPoint>> {
    if values.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return Vec::new();
    }

    let ema_fast = calculate_ema(values, fast);
    let ema_slow = calculate_ema(values, slow);
    let dif: Vec<Option<f64>> = (0..values.len())
        .map(|i| Some(ema_fast.get(i)? - ema_slow.get(i)?))
        .collect();

    let dif_start = fast.max(slow) - 1;
    let signal_start = dif_start + signal_period - 1;
    let mut points = vec![None; values.len()];

    if signal_start >= values.len() {
        return points;
    }

    let seed: f64 = dif[dif_start..=signal_start].iter().flatten().sum();
    let k = 2.0 / (signal_period as f64 + 1.0);
    let mut dea = seed / signal_period as f64;

    for i in signal_start..values.len() {
        let Some(d) = dif[i] else { continue };
        if i > signal_start {
            dea = d * k + dea * (1.0 - k);
        }
        points[i] = Some(MacdPoint {
            dif: d,
            dea,
            histogram: d - dea,
        });
    }

    points
}

/// Crossing of DIF over DEA at `index`.
///
/// Golden cross (`Up`): DIF > DEA now, DIF <= DEA on the previous value,
/// histogram > 0. Death cross (`Down`) mirrors it. Both values must be out
/// of warmup.
pub fn macd_cross(points: &[Option<MacdPoint>], index: usize) -> Option<Direction> {
    if index == 0 {
        return None;
    }
    let current = points.get(index).copied().flatten()?;
    let previous = points.get(index - 1).copied().flatten()?;

    if current.dif > current.dea && previous.dif <= previous.dea && current.histogram > 0.0 {
        Some(Direction::Up)
    } else if current.dif < current.dea
        && previous.dif >= previous.dea
        && current.histogram < 0.0
    {
        Some(Direction::Down)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    fn point(dif: f64, dea: f64) -> Option<MacdPoint> {
        Some(MacdPoint {
            dif,
            dea,
            histogram: dif - dea,
        })
    }

    #[test]
    fn macd_warmup_default() {
        let points = calculate_macd(&ramp(40), DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);

        let warmup = DEFAULT_SLOW - 1 + DEFAULT_SIGNAL - 1;
        for (i, p) in points.iter().enumerate().take(warmup) {
            assert!(p.is_none(), "index {} should be warmup", i);
        }
        assert!(points[warmup].is_some());
    }

    #[test]
    fn macd_histogram_equals_dif_minus_dea() {
        let points = calculate_macd(&ramp(40), 3, 6, 3);
        for p in points.iter().flatten() {
            assert!((p.histogram - (p.dif - p.dea)).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn macd_seed_is_mean_of_dif() {
        let values = ramp(10);
        let points = calculate_macd(&values, 2, 3, 2);

        let fast = calculate_ema(&values, 2);
        let slow = calculate_ema(&values, 3);
        let dif2 = fast.get(2).unwrap() - slow.get(2).unwrap();
        let dif3 = fast.get(3).unwrap() - slow.get(3).unwrap();

        let p = points[3].unwrap();
        assert!((p.dea - (dif2 + dif3) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn macd_flat_prices_are_zero() {
        let points = calculate_macd(&[50.0; 20], 3, 6, 3);
        for p in points.iter().flatten() {
            assert!(p.dif.abs() < 1e-12);
            assert!(p.dea.abs() < 1e-12);
        }
    }

    #[test]
    fn macd_insufficient_input() {
        let points = calculate_macd(&ramp(5), 3, 6, 3);
        assert_eq!(points.len(), 5);
        assert!(points.iter().all(Option::is_none));
    }

    #[test]
    fn macd_invalid_periods() {
        assert!(calculate_macd(&ramp(5), 0, 6, 3).is_empty());
        assert!(calculate_macd(&[], 3, 6, 3).is_empty());
    }

    #[test]
    fn golden_cross_detected() {
        let points = vec![point(-1.0, -0.5), point(0.5, 0.2)];
        assert_eq!(macd_cross(&points, 1), Some(Direction::Up));
    }

    #[test]
    fn death_cross_detected() {
        let points = vec![point(1.0, 0.5), point(-0.5, 0.2)];
        assert_eq!(macd_cross(&points, 1), Some(Direction::Down));
    }

    #[test]
    fn touching_previous_counts_as_cross() {
        let points = vec![point(0.3, 0.3), point(0.5, 0.3)];
        assert_eq!(macd_cross(&points, 1), Some(Direction::Up));
    }

    #[test]
    fn no_cross_when_already_above() {
        let points = vec![point(1.0, 0.5), point(1.2, 0.6)];
        assert_eq!(macd_cross(&points, 1), None);
    }

    #[test]
    fn no_cross_during_warmup() {
        let points = vec![None, point(0.5, 0.2)];
        assert_eq!(macd_cross(&points, 1), None);
        assert_eq!(macd_cross(&points, 0), None);
    }
}
