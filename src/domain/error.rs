//! Domain error types.

/// Top-level error type for levtrader.
#[derive(Debug, thiserror::Error)]
pub enum LevtraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid account configuration: {field} {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {symbol} {timeframe}")]
    NoData { symbol: String, timeframe: String },

    #[error("insufficient data for {symbol} {timeframe}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        timeframe: String,
        bars: usize,
        minimum: usize,
    },

    #[error("signal source failed at bar {index}: {reason}")]
    Signal { index: usize, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&LevtraderError> for std::process::ExitCode {
    fn from(err: &LevtraderError) -> Self {
        let code: u8 = match err {
            LevtraderError::Io(_) | LevtraderError::Csv(_) => 1,
            LevtraderError::ConfigParse { .. }
            | LevtraderError::ConfigMissing { .. }
            | LevtraderError::ConfigInvalid { .. }
            | LevtraderError::InvalidConfig { .. } => 2,
            LevtraderError::Data { .. } | LevtraderError::InvalidBar { .. } => 3,
            LevtraderError::Signal { .. } => 4,
            LevtraderError::NoData { .. } | LevtraderError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
