//! Default signal source: moving-average cluster breakout confirmed by a
//! MACD cross.
//!
//! A long intent fires when price breaks upward out of a moving-average
//! cluster on the same bar as a MACD golden cross; a short intent on a
//! downward breakout with a death cross. With retest confirmation enabled the
//! breakout must also be confirmed by a retest of the band.

use super::error::LevtraderError;
use super::indicator::{
    ClusterAnalysis, Direction, IndicatorType, calculate_macd, macd_cross,
};
use super::ohlcv::{OhlcvBar, closes};
use super::position::Side;
use super::signal::{SignalSource, TradeSignal};

pub const REASON_LONG: &str = "cluster_breakout_up_macd_bullish";
pub const REASON_SHORT: &str = "cluster_breakout_down_macd_bearish";

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub ma_periods: Vec<usize>,
    /// Maximum cluster width relative to price.
    pub cluster_threshold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub retest_confirmation: bool,
    pub retest_periods: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            ma_periods: vec![20, 60, 120],
            cluster_threshold: 0.01,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            retest_confirmation: false,
            retest_periods: 3,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), LevtraderError> {
        let invalid = |field: &'static str, reason: &str| LevtraderError::InvalidConfig {
            field,
            reason: reason.to_string(),
        };

        if self.ma_periods.len() < 2 {
            return Err(invalid("ma_periods", "needs at least two periods"));
        }
        if self.ma_periods.contains(&0) {
            return Err(invalid("ma_periods", "periods must be positive"));
        }
        if !self.cluster_threshold.is_finite() || self.cluster_threshold <= 0.0 {
            return Err(invalid("cluster_threshold", "must be positive"));
        }
        if self.macd_fast == 0 || self.macd_slow == 0 || self.macd_signal == 0 {
            return Err(invalid("macd", "periods must be positive"));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(invalid("macd_fast", "must be shorter than macd_slow"));
        }
        if self.retest_confirmation && self.retest_periods == 0 {
            return Err(invalid("retest_periods", "must be positive"));
        }
        Ok(())
    }

    /// Bars of history needed before any signal can fire.
    pub fn min_history(&self) -> usize {
        self.ma_periods.iter().copied().max().unwrap_or(0) + 1
    }

    pub fn indicators(&self) -> Vec<IndicatorType> {
        let mut out: Vec<IndicatorType> =
            self.ma_periods.iter().map(|&p| IndicatorType::Sma(p)).collect();
        out.push(IndicatorType::Macd {
            fast: self.macd_fast,
            slow: self.macd_slow,
            signal: self.macd_signal,
        });
        out
    }
}

#[derive(Debug, Clone)]
pub struct ClusterMacdStrategy {
    config: StrategyConfig,
}

impl ClusterMacdStrategy {
    pub fn new(config: StrategyConfig) -> Result<Self, LevtraderError> {
        config.validate()?;
        Ok(ClusterMacdStrategy { config })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }
}

impl SignalSource for ClusterMacdStrategy {
    fn signal(&self, history: &[OhlcvBar]) -> Result<Option<TradeSignal>, LevtraderError> {
        if history.len() < self.config.min_history() {
            return Ok(None);
        }
        let index = history.len() - 1;

        let values = closes(history);
        if let Some(bad) = values.iter().position(|c| !c.is_finite() || *c <= 0.0) {
            return Err(LevtraderError::Signal {
                index: bad,
                reason: "close price must be positive and finite".into(),
            });
        }

        let cluster = ClusterAnalysis::compute(
            &values,
            &self.config.ma_periods,
            self.config.cluster_threshold,
        );
        if !cluster.in_cluster[index] {
            return Ok(None);
        }
        let Some(breakout) = cluster.breakout[index] else {
            return Ok(None);
        };

        if self.config.retest_confirmation
            && cluster
                .retest(&values, index, self.config.retest_periods)
                .is_none()
        {
            return Ok(None);
        }

        let macd = calculate_macd(
            &values,
            self.config.macd_fast,
            self.config.macd_slow,
            self.config.macd_signal,
        );

        let signal = match (breakout, macd_cross(&macd, index)) {
            (Direction::Up, Some(Direction::Up)) => Some(TradeSignal::new(Side::Long, REASON_LONG)),
            (Direction::Down, Some(Direction::Down)) => {
                Some(TradeSignal::new(Side::Short, REASON_SHORT))
            }
            _ => None,
        };
        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(closes: &[f64]) -> Vec<OhlcvBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcvBar {
                timestamp: start + Duration::hours(4 * i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1.0,
            })
            .collect()
    }

    fn small_config() -> StrategyConfig {
        StrategyConfig {
            ma_periods: vec![2, 3],
            cluster_threshold: 0.05,
            macd_fast: 2,
            macd_slow: 3,
            macd_signal: 2,
            retest_confirmation: false,
            retest_periods: 2,
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = StrategyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_history(), 121);
    }

    #[test]
    fn invalid_configs_rejected() {
        let bad = [
            StrategyConfig { ma_periods: vec![20], ..Default::default() },
            StrategyConfig { ma_periods: vec![0, 20], ..Default::default() },
            StrategyConfig { cluster_threshold: 0.0, ..Default::default() },
            StrategyConfig { macd_fast: 26, macd_slow: 12, ..Default::default() },
            StrategyConfig { macd_signal: 0, ..Default::default() },
        ];
        for config in bad {
            assert!(ClusterMacdStrategy::new(config).is_err());
        }
    }

    #[test]
    fn indicators_listed() {
        let names: Vec<String> = StrategyConfig::default()
            .indicators()
            .iter()
            .map(|i| i.to_string())
            .collect();
        assert_eq!(names, vec!["SMA(20)", "SMA(60)", "SMA(120)", "MACD(12,26,9)"]);
    }

    #[test]
    fn no_signal_before_min_history() {
        let strategy = ClusterMacdStrategy::new(StrategyConfig::default()).unwrap();
        let history = bars(&[100.0; 120]);
        assert!(strategy.signal(&history).unwrap().is_none());
    }

    #[test]
    fn flat_market_gives_no_signal() {
        let strategy = ClusterMacdStrategy::new(small_config()).unwrap();
        let history = bars(&[100.0; 30]);
        for end in 1..=history.len() {
            assert!(strategy.signal(&history[..end]).unwrap().is_none());
        }
    }

    #[test]
    fn breakout_up_with_golden_cross_goes_long() {
        let strategy = ClusterMacdStrategy::new(small_config()).unwrap();
        // accelerating dip keeps DIF under DEA until the jump
        let history = bars(&[100.0, 100.0, 100.0, 99.8, 99.4, 98.8, 98.0, 101.0]);
        let signal = strategy.signal(&history).unwrap().unwrap();
        assert_eq!(signal.side, Side::Long);
        assert_eq!(signal.reason, REASON_LONG);
        assert!((signal.strength - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn breakout_down_with_death_cross_goes_short() {
        let strategy = ClusterMacdStrategy::new(small_config()).unwrap();
        let history = bars(&[100.0, 100.2, 100.6, 101.2, 102.0, 99.0]);
        let signal = strategy.signal(&history).unwrap().unwrap();
        assert_eq!(signal.side, Side::Short);
        assert_eq!(signal.reason, REASON_SHORT);
    }

    #[test]
    fn signal_fires_only_on_breakout_bar() {
        let strategy = ClusterMacdStrategy::new(small_config()).unwrap();
        let history = bars(&[100.0, 100.0, 100.0, 99.8, 99.4, 98.8, 98.0, 101.0]);
        for end in 1..history.len() {
            assert!(strategy.signal(&history[..end]).unwrap().is_none());
        }
        let first = strategy.signal(&history).unwrap();
        assert!(first.is_some());
        assert_eq!(first, strategy.signal(&history).unwrap());
    }

    #[test]
    fn invalid_close_is_signal_error() {
        let strategy = ClusterMacdStrategy::new(small_config()).unwrap();
        let mut history = bars(&[100.0; 5]);
        history[2].close = f64::NAN;
        assert!(matches!(
            strategy.signal(&history),
            Err(LevtraderError::Signal { index: 2, .. })
        ));
    }
}
