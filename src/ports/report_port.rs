//! Report generation port trait.

use std::path::PathBuf;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::LevtraderError;
use crate::domain::metrics::Metrics;

/// Port for writing backtest reports.
pub trait ReportPort {
    /// Write the report for one symbol/timeframe run. Returns where it was written.
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        symbol: &str,
        timeframe: &str,
    ) -> Result<PathBuf, LevtraderError>;
}
