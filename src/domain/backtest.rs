//! Backtest driver: walks the bar sequence once, in order.
//!
//! Per bar: mark the ledger (forced exits), ask the signal source for an
//! intent, act on it, then sample the equity curve. After the final bar any
//! open position is closed at the last close so the run always ends flat.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::LevtraderError;
use super::metrics::Metrics;
use super::ohlcv::{OhlcvBar, validate_bars};
use super::portfolio::{EntryResult, EquityPoint, Portfolio, PortfolioConfig};
use super::position::{ExitReason, Side, Trade};
use super::signal::{SignalSource, TradeSignal};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    /// When set, an opposite-side signal while a position is open flips it.
    /// Otherwise signals are ignored until the position is closed.
    pub reverse_on_opposite_signal: bool,
}

/// A signal that resulted in an entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRecord {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub price: f64,
    pub strength: f64,
    pub notional: f64,
    pub reason: String,
}

enum SignalOutcome {
    Ignored,
    Executed(SignalRecord),
    Refused,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
    pub signals: Vec<SignalRecord>,
    /// Signals refused by the ledger (insufficient margin or invalid size).
    pub rejected_signals: usize,
}

impl BacktestResult {
    pub fn trades(&self) -> &[Trade] {
        self.portfolio.trades()
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        self.portfolio.equity_curve()
    }

    pub fn metrics(&self) -> Metrics {
        Metrics::compute(
            self.trades(),
            self.equity_curve(),
            self.portfolio.initial_equity(),
            self.portfolio.equity(),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct BacktestEngine {
    portfolio_config: PortfolioConfig,
    engine_config: EngineConfig,
}

impl BacktestEngine {
    pub fn new(portfolio_config: PortfolioConfig, engine_config: EngineConfig) -> Self {
        BacktestEngine {
            portfolio_config,
            engine_config,
        }
    }

    pub fn run<S>(&self, bars: &[OhlcvBar], source: &S) -> Result<BacktestResult, LevtraderError>
    where
        S: SignalSource + ?Sized,
    {
        validate_bars(bars)?;
        let mut portfolio = Portfolio::new(self.portfolio_config.clone())?;
        let mut signals = Vec::new();
        let mut rejected_signals = 0;

        info!(bars = bars.len(), "starting backtest");

        for (i, bar) in bars.iter().enumerate() {
            portfolio.update(bar.timestamp, bar.close);

            if let Some(signal) = source.signal(&bars[..=i])? {
                match self.act_on_signal(&mut portfolio, bar, &signal) {
                    SignalOutcome::Executed(record) => signals.push(record),
                    SignalOutcome::Refused => rejected_signals += 1,
                    SignalOutcome::Ignored => {}
                }
            }

            portfolio.record_equity(bar.timestamp);
        }

        if let Some(last) = bars.last() {
            portfolio.close_with_reason(last.timestamp, last.close, ExitReason::EndOfData);
        }

        info!(
            trades = portfolio.trades().len(),
            final_equity = portfolio.equity(),
            rejected_signals,
            "backtest complete"
        );

        Ok(BacktestResult {
            portfolio,
            signals,
            rejected_signals,
        })
    }

    fn act_on_signal(
        &self,
        portfolio: &mut Portfolio,
        bar: &OhlcvBar,
        signal: &TradeSignal,
    ) -> SignalOutcome {
        if let Some(position) = portfolio.position() {
            let flip = self.engine_config.reverse_on_opposite_signal
                && signal.side == position.side.opposite();
            if !flip {
                debug!(
                    side = %signal.side,
                    reason = %signal.reason,
                    "position open, signal ignored"
                );
                return SignalOutcome::Ignored;
            }
        }

        let notional = portfolio.max_notional() * signal.strength;
        match portfolio.open(bar.timestamp, signal.side, bar.close, notional) {
            EntryResult::Entered { .. } => SignalOutcome::Executed(SignalRecord {
                timestamp: bar.timestamp,
                side: signal.side,
                price: bar.close,
                strength: signal.strength,
                notional,
                reason: signal.reason.clone(),
            }),
            EntryResult::InsufficientMargin { .. } | EntryResult::InvalidOrder { .. } => {
                warn!(
                    timestamp = %bar.timestamp,
                    side = %signal.side,
                    strength = signal.strength,
                    "signal refused by ledger"
                );
                SignalOutcome::Refused
            }
        }
    }
}

/// Run a backtest with the given account and engine settings.
pub fn run_backtest<S>(
    bars: &[OhlcvBar],
    source: &S,
    portfolio_config: PortfolioConfig,
    engine_config: EngineConfig,
) -> Result<BacktestResult, LevtraderError>
where
    S: SignalSource + ?Sized,
{
    BacktestEngine::new(portfolio_config, engine_config).run(bars, source)
}
