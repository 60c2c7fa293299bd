//! Signal source contract consumed by the backtest driver.

use super::error::LevtraderError;
use super::ohlcv::OhlcvBar;
use super::position::Side;

/// Intent to hold a position on `side`, sized at `strength` of max notional.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeSignal {
    pub side: Side,
    /// Fraction of max notional. Not clamped; values above 1 will usually be
    /// refused for lack of margin.
    pub strength: f64,
    pub reason: String,
}

impl TradeSignal {
    pub fn new(side: Side, reason: impl Into<String>) -> Self {
        TradeSignal {
            side,
            strength: 1.0,
            reason: reason.into(),
        }
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }
}

/// Produces at most one trade intent per bar.
///
/// `history` is every bar up to and including the current one, so a source
/// cannot look ahead. Implementations must be deterministic for a given
/// history.
pub trait SignalSource {
    fn signal(&self, history: &[OhlcvBar]) -> Result<Option<TradeSignal>, LevtraderError>;
}

impl<F> SignalSource for F
where
    F: Fn(&[OhlcvBar]) -> Result<Option<TradeSignal>, LevtraderError>,
{
    fn signal(&self, history: &[OhlcvBar]) -> Result<Option<TradeSignal>, LevtraderError> {
        self(history)
    }
}
