#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use levtrader::domain::error::LevtraderError;
pub use levtrader::domain::ohlcv::OhlcvBar;
use levtrader::domain::portfolio::PortfolioConfig;
use levtrader::domain::position::Side;
use levtrader::domain::signal::TradeSignal;
use levtrader::domain::strategy::StrategyConfig;
use levtrader::ports::data_port::{DataPort, DataRange};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }
}

impl DataPort for MockDataPort {
    fn load_bars(&self, symbol: &str, timeframe: &str) -> Result<Vec<OhlcvBar>, LevtraderError> {
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => Ok(bars.clone()),
            _ => Err(LevtraderError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            }),
        }
    }

    fn list_symbols(&self, _timeframe: &str) -> Result<Vec<String>, LevtraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
        _timeframe: &str,
    ) -> Result<Option<DataRange>, LevtraderError> {
        Ok(self.data.get(symbol).and_then(|bars| {
            Some(DataRange {
                first: bars.first()?.timestamp,
                last: bars.last()?.timestamp,
                bars: bars.len(),
            })
        }))
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Flat bars (open = high = low = close) four hours apart.
pub fn make_bars(closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| OhlcvBar {
            timestamp: t0() + Duration::hours(4 * i as i64),
            open: c,
            high: c,
            low: c,
            close: c,
            volume: 1_000.0,
        })
        .collect()
}

/// No fees, slippage or TP/SL; margin call at the default maintenance rate.
pub fn frictionless(initial_equity: f64, leverage: f64) -> PortfolioConfig {
    PortfolioConfig {
        initial_equity,
        leverage,
        fee_rate: 0.0,
        slippage_rate: 0.0,
        take_profit: 0.0,
        stop_loss: 0.0,
        ..PortfolioConfig::default()
    }
}

/// Signal source that emits `(side, strength)` at the listed bar indices.
pub fn scripted(
    script: Vec<(usize, Side, f64)>,
) -> impl Fn(&[OhlcvBar]) -> Result<Option<TradeSignal>, LevtraderError> {
    move |history: &[OhlcvBar]| {
        let i = history.len() - 1;
        Ok(script
            .iter()
            .find(|(at, _, _)| *at == i)
            .map(|&(_, side, strength)| {
                TradeSignal::new(side, format!("scripted_{}", i)).with_strength(strength)
            }))
    }
}

/// Closes that produce one long cluster-breakout signal on the last bar
/// under [`small_strategy_config`].
pub const LONG_BREAKOUT_CLOSES: [f64; 8] = [100.0, 100.0, 100.0, 99.8, 99.4, 98.8, 98.0, 101.0];

pub fn small_strategy_config() -> StrategyConfig {
    StrategyConfig {
        ma_periods: vec![2, 3],
        cluster_threshold: 0.05,
        macd_fast: 2,
        macd_slow: 3,
        macd_signal: 2,
        ..StrategyConfig::default()
    }
}

pub fn write_bars_csv(dir: &Path, symbol: &str, timeframe: &str, bars: &[OhlcvBar]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for bar in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    fs::write(dir.join(format!("{}_{}.csv", symbol, timeframe)), content).unwrap();
}

pub fn assert_close(actual: f64, expected: f64) {
    let tol = 1e-6 * (1.0 + expected.abs());
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected}, got {actual}"
    );
}
