//! CSV report adapter implementing ReportPort.
//!
//! Writes one directory per run, `{reports_dir}/{SYMBOL}_{timeframe}/`,
//! holding the trade ledger, equity curve, executed signals, metrics and
//! monthly breakdown as separate CSV files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::LevtraderError;
use crate::domain::metrics::{Metrics, monthly_breakdown};
use crate::ports::report_port::ReportPort;

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity_curve.csv";
pub const SIGNALS_FILE: &str = "signals.csv";
pub const METRICS_FILE: &str = "metrics.csv";
pub const MONTHLY_FILE: &str = "monthly.csv";

const TRADE_HEADER: &[&str] = &[
    "entry_timestamp",
    "exit_timestamp",
    "side",
    "entry_price",
    "exit_price",
    "quantity",
    "notional",
    "leverage",
    "pnl",
    "fees",
    "slippage",
    "duration_hours",
    "exit_reason",
    "mae",
    "mfe",
];
const EQUITY_HEADER: &[&str] = &["timestamp", "equity"];
const SIGNAL_HEADER: &[&str] = &["timestamp", "side", "price", "strength", "notional", "reason"];
const METRIC_HEADER: &[&str] = &["metric", "value"];
const MONTHLY_HEADER: &[&str] = &["month", "trades", "pnl", "win_rate"];

#[derive(Serialize)]
struct MetricRow {
    metric: &'static str,
    value: f64,
}

pub struct CsvReportAdapter {
    reports_dir: PathBuf,
}

impl CsvReportAdapter {
    pub fn new(reports_dir: PathBuf) -> Self {
        Self { reports_dir }
    }

    pub fn run_dir(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.reports_dir
            .join(format!("{}_{}", symbol.to_uppercase(), timeframe))
    }
}

/// Header row, then one serialized record per row. The header is written
/// even when `rows` is empty.
fn write_rows<T: Serialize>(
    path: &Path,
    header: &[&str],
    rows: &[T],
) -> Result<(), LevtraderError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    wtr.write_record(header)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        symbol: &str,
        timeframe: &str,
    ) -> Result<PathBuf, LevtraderError> {
        let dir = self.run_dir(symbol, timeframe);
        fs::create_dir_all(&dir)?;

        write_rows(&dir.join(TRADES_FILE), TRADE_HEADER, result.trades())?;
        write_rows(&dir.join(EQUITY_FILE), EQUITY_HEADER, result.equity_curve())?;
        write_rows(&dir.join(SIGNALS_FILE), SIGNAL_HEADER, &result.signals)?;

        let metric_rows: Vec<MetricRow> = metrics
            .to_map()
            .into_iter()
            .map(|(metric, value)| MetricRow { metric, value })
            .collect();
        write_rows(&dir.join(METRICS_FILE), METRIC_HEADER, &metric_rows)?;

        write_rows(
            &dir.join(MONTHLY_FILE),
            MONTHLY_HEADER,
            &monthly_breakdown(result.trades()),
        )?;

        info!(dir = %dir.display(), trades = result.trades().len(), "report written");
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{BacktestEngine, EngineConfig};
    use crate::domain::error::LevtraderError;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::portfolio::PortfolioConfig;
    use crate::domain::position::Side;
    use crate::domain::signal::TradeSignal;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

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

    fn backtest_result(enter_on_first_bar: bool) -> BacktestResult {
        let source = move |history: &[OhlcvBar]| -> Result<Option<TradeSignal>, LevtraderError> {
            Ok((enter_on_first_bar && history.len() == 1)
                .then(|| TradeSignal::new(Side::Long, "first_bar")))
        };
        let config = PortfolioConfig {
            fee_rate: 0.0,
            slippage_rate: 0.0,
            take_profit: 0.0,
            stop_loss: 0.0,
            ..PortfolioConfig::default()
        };
        BacktestEngine::new(config, EngineConfig::default())
            .run(&bars(&[100.0, 101.0, 102.0]), &source)
            .unwrap()
    }

    fn sample_backtest_result() -> BacktestResult {
        backtest_result(true)
    }

    /// First line `csv` would write for `row` with automatic headers.
    fn serde_header<T: Serialize>(row: &T) -> String {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.serialize(row).unwrap();
        let bytes = wtr.into_inner().unwrap();
        String::from_utf8(bytes).unwrap().lines().next().unwrap().to_string()
    }

    #[test]
    fn write_creates_all_files() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvReportAdapter::new(dir.path().join("reports"));
        let result = sample_backtest_result();
        let metrics = result.metrics();

        let out = adapter.write(&result, &metrics, "btcusdt", "4h").unwrap();

        assert_eq!(out, dir.path().join("reports").join("BTCUSDT_4h"));
        for file in [TRADES_FILE, EQUITY_FILE, SIGNALS_FILE, METRICS_FILE, MONTHLY_FILE] {
            assert!(out.join(file).exists(), "missing {}", file);
        }
    }

    #[test]
    fn trades_file_has_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvReportAdapter::new(dir.path().to_path_buf());
        let result = sample_backtest_result();

        let out = adapter
            .write(&result, &result.metrics(), "BTCUSDT", "4h")
            .unwrap();

        let contents = fs::read_to_string(out.join(TRADES_FILE)).unwrap();
        let mut lines = contents.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("entry_timestamp,exit_timestamp,side"));
        let row = lines.next().unwrap();
        assert!(row.contains("long"));
        assert!(row.contains("end_of_data"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn equity_and_signal_files_match_result() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvReportAdapter::new(dir.path().to_path_buf());
        let result = sample_backtest_result();

        let out = adapter
            .write(&result, &result.metrics(), "BTCUSDT", "4h")
            .unwrap();

        let equity = fs::read_to_string(out.join(EQUITY_FILE)).unwrap();
        assert_eq!(equity.lines().count(), result.equity_curve().len() + 1);
        assert!(equity.starts_with("timestamp,equity"));

        let signals = fs::read_to_string(out.join(SIGNALS_FILE)).unwrap();
        assert_eq!(signals.lines().count(), 2);
        assert!(signals.contains("first_bar"));
    }

    #[test]
    fn metrics_file_lists_every_metric() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvReportAdapter::new(dir.path().to_path_buf());
        let result = sample_backtest_result();
        let metrics = result.metrics();

        let out = adapter.write(&result, &metrics, "BTCUSDT", "4h").unwrap();

        let contents = fs::read_to_string(out.join(METRICS_FILE)).unwrap();
        assert!(contents.starts_with("metric,value"));
        assert_eq!(contents.lines().count(), metrics.to_map().len() + 1);
        assert!(contents.contains("total_trades,1"));
    }

    #[test]
    fn run_without_trades_writes_header_only_files() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvReportAdapter::new(dir.path().to_path_buf());
        let result = backtest_result(false);
        assert!(result.trades().is_empty());

        let out = adapter
            .write(&result, &result.metrics(), "BTCUSDT", "4h")
            .unwrap();

        for (file, header) in [
            (TRADES_FILE, TRADE_HEADER),
            (SIGNALS_FILE, SIGNAL_HEADER),
            (MONTHLY_FILE, MONTHLY_HEADER),
        ] {
            let contents = fs::read_to_string(out.join(file)).unwrap();
            assert_eq!(contents, format!("{}\n", header.join(",")), "{}", file);
        }

        let mut reader = csv::Reader::from_path(out.join(TRADES_FILE)).unwrap();
        assert_eq!(reader.headers().unwrap().len(), TRADE_HEADER.len());
        assert_eq!(reader.records().count(), 0);
    }

    #[test]
    fn headers_match_serialized_fields() {
        let result = sample_backtest_result();
        let trades = result.trades();
        let months = monthly_breakdown(trades);
        let metric = MetricRow {
            metric: "total_trades",
            value: 1.0,
        };

        assert_eq!(serde_header(&trades[0]), TRADE_HEADER.join(","));
        assert_eq!(serde_header(&result.equity_curve()[0]), EQUITY_HEADER.join(","));
        assert_eq!(serde_header(&result.signals[0]), SIGNAL_HEADER.join(","));
        assert_eq!(serde_header(&metric), METRIC_HEADER.join(","));
        assert_eq!(serde_header(&months[0]), MONTHLY_HEADER.join(","));
    }
}
