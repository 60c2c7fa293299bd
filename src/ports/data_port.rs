//! Data access port trait.

use crate::domain::error::LevtraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct DataRange {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
    pub bars: usize,
}

pub trait DataPort {
    /// All bars for `symbol` at `timeframe`, sorted by timestamp.
    /// Missing or empty data is `LevtraderError::NoData`.
    fn load_bars(&self, symbol: &str, timeframe: &str) -> Result<Vec<OhlcvBar>, LevtraderError>;

    fn list_symbols(&self, timeframe: &str) -> Result<Vec<String>, LevtraderError>;

    /// `None` when no data is stored for the pair.
    fn data_range(
        &self,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Option<DataRange>, LevtraderError>;
}
