//! Configuration validation.
//!
//! Reads every section through [`ConfigPort`], applies defaults for absent
//! keys and rejects present-but-invalid values with
//! `LevtraderError::ConfigInvalid` naming the offending section and key.

use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::backtest::EngineConfig;
use crate::domain::error::LevtraderError;
use crate::domain::portfolio::PortfolioConfig;
use crate::domain::strategy::StrategyConfig;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::{ConfigPort, parse_bool};

const ACCOUNT: &str = "account";
const STRATEGY: &str = "strategy";
const ENGINE: &str = "engine";
const DATA: &str = "data";

/// Where input data lives and where reports go.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub data_dir: PathBuf,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub reports_dir: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        DataSettings {
            data_dir: PathBuf::from("data/raw"),
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::H4,
            reports_dir: PathBuf::from("reports"),
        }
    }
}

pub fn account_config(config: &dyn ConfigPort) -> Result<PortfolioConfig, LevtraderError> {
    let d = PortfolioConfig::default();
    let account = PortfolioConfig {
        initial_equity: read_f64(config, ACCOUNT, "initial_equity", d.initial_equity)?,
        leverage: read_f64(config, ACCOUNT, "leverage", d.leverage)?,
        fee_rate: read_f64(config, ACCOUNT, "fee_rate", d.fee_rate)?,
        slippage_rate: read_f64(config, ACCOUNT, "slippage_rate", d.slippage_rate)?,
        maintenance_margin: read_f64(config, ACCOUNT, "maintenance_margin", d.maintenance_margin)?,
        take_profit: read_f64(config, ACCOUNT, "take_profit", d.take_profit)?,
        stop_loss: read_f64(config, ACCOUNT, "stop_loss", d.stop_loss)?,
    };

    ensure(
        account.initial_equity > 0.0,
        ACCOUNT,
        "initial_equity",
        "initial_equity must be positive",
    )?;
    ensure(
        account.leverage >= 1.0,
        ACCOUNT,
        "leverage",
        "leverage must be at least 1",
    )?;
    validate_rate(account.fee_rate, "fee_rate")?;
    validate_rate(account.slippage_rate, "slippage_rate")?;
    validate_rate(account.maintenance_margin, "maintenance_margin")?;
    ensure(
        account.take_profit >= 0.0,
        ACCOUNT,
        "take_profit",
        "take_profit must be non-negative (0 disables)",
    )?;
    ensure(
        account.stop_loss >= 0.0,
        ACCOUNT,
        "stop_loss",
        "stop_loss must be non-negative (0 disables)",
    )?;

    Ok(account)
}

pub fn strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, LevtraderError> {
    let d = StrategyConfig::default();

    let ma_periods = match config.get_list(STRATEGY, "ma_periods") {
        None => d.ma_periods,
        Some(items) => items
            .iter()
            .map(|s| parse_value::<usize>(s, STRATEGY, "ma_periods"))
            .collect::<Result<Vec<_>, _>>()?,
    };

    let strategy = StrategyConfig {
        ma_periods,
        cluster_threshold: read_f64(config, STRATEGY, "cluster_pct", d.cluster_threshold)?,
        macd_fast: read_usize(config, STRATEGY, "macd_fast", d.macd_fast)?,
        macd_slow: read_usize(config, STRATEGY, "macd_slow", d.macd_slow)?,
        macd_signal: read_usize(config, STRATEGY, "macd_signal", d.macd_signal)?,
        retest_confirmation: read_bool(
            config,
            STRATEGY,
            "retest_confirmation",
            d.retest_confirmation,
        )?,
        retest_periods: read_usize(config, STRATEGY, "retest_periods", d.retest_periods)?,
    };

    ensure(
        strategy.ma_periods.len() >= 2 && !strategy.ma_periods.contains(&0),
        STRATEGY,
        "ma_periods",
        "ma_periods needs at least two positive periods",
    )?;
    ensure(
        strategy.cluster_threshold > 0.0,
        STRATEGY,
        "cluster_pct",
        "cluster_pct must be positive",
    )?;
    ensure(
        strategy.macd_fast > 0 && strategy.macd_fast < strategy.macd_slow,
        STRATEGY,
        "macd_fast",
        "macd_fast must be positive and shorter than macd_slow",
    )?;
    ensure(
        strategy.macd_signal > 0,
        STRATEGY,
        "macd_signal",
        "macd_signal must be positive",
    )?;
    ensure(
        strategy.retest_periods > 0,
        STRATEGY,
        "retest_periods",
        "retest_periods must be positive",
    )?;

    Ok(strategy)
}

pub fn engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, LevtraderError> {
    Ok(EngineConfig {
        reverse_on_opposite_signal: read_bool(config, ENGINE, "reverse_on_opposite_signal", false)?,
    })
}

pub fn data_settings(config: &dyn ConfigPort) -> Result<DataSettings, LevtraderError> {
    let d = DataSettings::default();

    let symbol = match config.get_string(DATA, "symbol") {
        Some(s) if s.trim().is_empty() => {
            return Err(LevtraderError::ConfigMissing {
                section: DATA.to_string(),
                key: "symbol".to_string(),
            });
        }
        Some(s) => s.trim().to_uppercase(),
        None => d.symbol,
    };

    let timeframe = match config.get_string(DATA, "timeframe") {
        Some(s) => parse_timeframe(&s)?,
        None => d.timeframe,
    };

    Ok(DataSettings {
        data_dir: config
            .get_string(DATA, "data_dir")
            .map(PathBuf::from)
            .unwrap_or(d.data_dir),
        symbol,
        timeframe,
        reports_dir: config
            .get_string(DATA, "reports_dir")
            .map(PathBuf::from)
            .unwrap_or(d.reports_dir),
    })
}

pub fn parse_timeframe(value: &str) -> Result<Timeframe, LevtraderError> {
    Timeframe::from_str(value).map_err(|reason| LevtraderError::ConfigInvalid {
        section: DATA.to_string(),
        key: "timeframe".to_string(),
        reason,
    })
}

fn validate_rate(value: f64, key: &str) -> Result<(), LevtraderError> {
    ensure(
        (0.0..1.0).contains(&value),
        ACCOUNT,
        key,
        &format!("{} must be in [0, 1)", key),
    )
}

fn ensure(ok: bool, section: &str, key: &str, reason: &str) -> Result<(), LevtraderError> {
    if ok {
        Ok(())
    } else {
        Err(LevtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        })
    }
}

fn parse_value<T: FromStr>(raw: &str, section: &str, key: &str) -> Result<T, LevtraderError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| LevtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("cannot parse '{}'", raw.trim()),
        })
}

fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, LevtraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => {
            let value: f64 = parse_value(&raw, section, key)?;
            ensure(
                value.is_finite(),
                section,
                key,
                &format!("{} must be finite", key),
            )?;
            Ok(value)
        }
    }
}

fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, LevtraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => parse_value(&raw, section, key),
    }
}

fn read_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, LevtraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => parse_bool(&raw).ok_or_else(|| LevtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("expected a boolean, got '{}'", raw.trim()),
        }),
    }
}
