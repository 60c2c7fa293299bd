//! CSV file bar data adapter.
//!
//! One file per symbol and timeframe, `{SYMBOL}_{timeframe}.csv`, with header
//! `timestamp,open,high,low,close,volume`.

use crate::domain::error::LevtraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::{DataPort, DataRange};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::StringRecord;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", symbol.to_uppercase(), timeframe))
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` with an optional offset, a bare
/// date, or integer epoch milliseconds. Naive values are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

fn parse_price(
    record: &StringRecord,
    col: usize,
    name: &str,
    line: usize,
) -> Result<f64, LevtraderError> {
    record
        .get(col)
        .ok_or_else(|| LevtraderError::Data {
            reason: format!("line {}: missing {} column", line, name),
        })?
        .trim()
        .parse()
        .map_err(|e| LevtraderError::Data {
            reason: format!("line {}: invalid {} value: {}", line, name, e),
        })
}

impl DataPort for CsvAdapter {
    fn load_bars(&self, symbol: &str, timeframe: &str) -> Result<Vec<OhlcvBar>, LevtraderError> {
        let no_data = || LevtraderError::NoData {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        };

        let path = self.csv_path(symbol, timeframe);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(no_data()),
            Err(e) => {
                return Err(LevtraderError::Data {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (row, result) in rdr.records().enumerate() {
            // header is line 1
            let line = row + 2;
            let record = result.map_err(|e| LevtraderError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let ts_str = record.get(0).ok_or_else(|| LevtraderError::Data {
                reason: format!("line {}: missing timestamp column", line),
            })?;
            let timestamp = parse_timestamp(ts_str).ok_or_else(|| LevtraderError::Data {
                reason: format!("line {}: invalid timestamp '{}'", line, ts_str),
            })?;

            bars.push(OhlcvBar {
                timestamp,
                open: parse_price(&record, 1, "open", line)?,
                high: parse_price(&record, 2, "high", line)?,
                low: parse_price(&record, 3, "low", line)?,
                close: parse_price(&record, 4, "close", line)?,
                volume: parse_price(&record, 5, "volume", line)?,
            });
        }

        if bars.is_empty() {
            return Err(no_data());
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    fn list_symbols(&self, timeframe: &str) -> Result<Vec<String>, LevtraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| LevtraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", timeframe);
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| LevtraderError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(&suffix) {
                if !symbol.is_empty() {
                    symbols.push(symbol.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Option<DataRange>, LevtraderError> {
        let bars = match self.load_bars(symbol, timeframe) {
            Ok(bars) => bars,
            Err(LevtraderError::NoData { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(bars.first().zip(bars.last()).map(|(first, last)| DataRange {
            first: first.timestamp,
            last: last.timestamp,
            bars: bars.len(),
        }))
    }
}
