//! Margin account ledger: equity, the single open position, closed trades
//! and the equity curve.
//!
//! The position moves between two states only. `open` takes it from absent
//! to open; `close` (explicit, target hit, margin call or end of run) takes
//! it back. Opening while a position exists is a two-step sequence: the old
//! position is closed first and recorded as a trade, then the new one is
//! entered.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::LevtraderError;
use super::execution::{
    apply_slippage_entry, apply_slippage_exit, calculate_fee, slippage_cost, target_prices,
};
use super::position::{ExitReason, Position, Side, Trade};

/// Account parameters, fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioConfig {
    pub initial_equity: f64,
    pub leverage: f64,
    pub fee_rate: f64,
    pub slippage_rate: f64,
    /// Minimum mark equity / notional before forced liquidation.
    pub maintenance_margin: f64,
    /// Take-profit as a fraction of margin (leveraged terms). 0 disables.
    pub take_profit: f64,
    /// Stop-loss as a fraction of margin (leveraged terms). 0 disables.
    pub stop_loss: f64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        PortfolioConfig {
            initial_equity: 5000.0,
            leverage: 10.0,
            fee_rate: 0.0008,
            slippage_rate: 0.0005,
            maintenance_margin: 0.005,
            take_profit: 0.25,
            stop_loss: 0.05,
        }
    }
}

impl PortfolioConfig {
    pub fn validate(&self) -> Result<(), LevtraderError> {
        let invalid = |field: &'static str, reason: &str| LevtraderError::InvalidConfig {
            field,
            reason: reason.to_string(),
        };

        if !self.initial_equity.is_finite() || self.initial_equity <= 0.0 {
            return Err(invalid("initial_equity", "must be positive"));
        }
        if !self.leverage.is_finite() || self.leverage < 1.0 {
            return Err(invalid("leverage", "must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(invalid("fee_rate", "must be in [0, 1)"));
        }
        if !(0.0..1.0).contains(&self.slippage_rate) {
            return Err(invalid("slippage_rate", "must be in [0, 1)"));
        }
        if !(0.0..1.0).contains(&self.maintenance_margin) {
            return Err(invalid("maintenance_margin", "must be in [0, 1)"));
        }
        if !self.take_profit.is_finite() || self.take_profit < 0.0 {
            return Err(invalid("take_profit", "must be non-negative"));
        }
        if !self.stop_loss.is_finite() || self.stop_loss < 0.0 {
            return Err(invalid("stop_loss", "must be non-negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Outcome of an `open` request.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        quantity: f64,
        entry_price: f64,
        fee: f64,
        slippage_cost: f64,
        /// Trade produced by closing the previous position, if one was open.
        replaced: Option<Trade>,
    },
    /// Required margin exceeds equity. Nothing changed.
    InsufficientMargin { required: f64, available: f64 },
    /// Notional or price not positive and finite. Nothing changed.
    InvalidOrder { notional: f64, market_price: f64 },
}

impl EntryResult {
    pub fn is_entered(&self) -> bool {
        matches!(self, EntryResult::Entered { .. })
    }
}

/// Snapshot of the account for display.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub initial_equity: f64,
    pub current_equity: f64,
    pub total_return: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub profit_loss_ratio: f64,
    pub total_fees: f64,
    pub total_slippage: f64,
    pub leverage: f64,
    pub has_position: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    config: PortfolioConfig,
    equity: f64,
    position: Option<Position>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    winning_trades: usize,
    losing_trades: usize,
    total_fees: f64,
    total_slippage: f64,
}

impl Portfolio {
    pub fn new(config: PortfolioConfig) -> Result<Self, LevtraderError> {
        config.validate()?;
        Ok(Portfolio {
            equity: config.initial_equity,
            config,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            winning_trades: 0,
            losing_trades: 0,
            total_fees: 0.0,
            total_slippage: 0.0,
        })
    }

    pub fn config(&self) -> &PortfolioConfig {
        &self.config
    }

    pub fn initial_equity(&self) -> f64 {
        self.config.initial_equity
    }

    /// Realized equity: cash after all fees, slippage and closed PnL.
    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn leverage(&self) -> f64 {
        self.config.leverage
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn winning_trades(&self) -> usize {
        self.winning_trades
    }

    pub fn losing_trades(&self) -> usize {
        self.losing_trades
    }

    pub fn total_fees(&self) -> f64 {
        self.total_fees
    }

    pub fn total_slippage(&self) -> f64 {
        self.total_slippage
    }

    /// Largest notional the current equity supports: `equity * leverage`.
    pub fn max_notional(&self) -> f64 {
        self.equity * self.config.leverage
    }

    /// True when the margin for `notional` fits in current equity. Reserves nothing.
    pub fn can_open(&self, notional: f64) -> bool {
        notional / self.config.leverage <= self.equity
    }

    /// Equity not committed as margin to the open position.
    pub fn available_margin(&self) -> f64 {
        match &self.position {
            Some(pos) => self.equity - pos.margin,
            None => self.equity,
        }
    }

    /// Equity including the leveraged unrealized PnL of the open position.
    pub fn mark_equity(&self) -> f64 {
        match &self.position {
            Some(pos) => self.equity + pos.leveraged_unrealized_pnl(),
            None => self.equity,
        }
    }

    /// Open a position of `notional` at `market_price`.
    ///
    /// Entry costs (fee and slippage) are taken from equity immediately. If a
    /// position is already open it is closed at `market_price` first and the
    /// resulting trade is returned in `EntryResult::Entered::replaced`.
    pub fn open(
        &mut self,
        timestamp: DateTime<Utc>,
        side: Side,
        market_price: f64,
        notional: f64,
    ) -> EntryResult {
        if !(notional.is_finite() && notional > 0.0 && market_price.is_finite() && market_price > 0.0)
        {
            warn!(notional, market_price, "rejected order with invalid size or price");
            return EntryResult::InvalidOrder {
                notional,
                market_price,
            };
        }

        if !self.can_open(notional) {
            let required = notional / self.config.leverage;
            warn!(
                required,
                available = self.equity,
                "insufficient margin to open position"
            );
            return EntryResult::InsufficientMargin {
                required,
                available: self.equity,
            };
        }

        let replaced = if self.position.is_some() {
            self.close_with_reason(timestamp, market_price, ExitReason::Reversal)
        } else {
            None
        };

        let entry_price = apply_slippage_entry(market_price, side, self.config.slippage_rate);
        let quantity = notional / entry_price;
        let fee = calculate_fee(notional, self.config.fee_rate);
        let entry_slippage = slippage_cost(entry_price, market_price, quantity);
        let (take_profit_price, stop_loss_price) = target_prices(
            entry_price,
            side,
            self.config.leverage,
            self.config.take_profit,
            self.config.stop_loss,
        );

        self.position = Some(Position {
            side,
            entry_price,
            quantity,
            notional,
            margin: notional / self.config.leverage,
            leverage: self.config.leverage,
            entry_timestamp: timestamp,
            unrealized_pnl: 0.0,
            take_profit_price,
            stop_loss_price,
            entry_fee: fee,
            entry_slippage,
            mae: 0.0,
            mfe: 0.0,
        });

        self.equity -= fee + entry_slippage;
        self.total_fees += fee;
        self.total_slippage += entry_slippage;

        info!(
            %side,
            quantity,
            entry_price,
            notional,
            "opened position"
        );

        EntryResult::Entered {
            quantity,
            entry_price,
            fee,
            slippage_cost: entry_slippage,
            replaced,
        }
    }

    /// Close the open position at `market_price`. Returns `None` when flat.
    pub fn close(&mut self, timestamp: DateTime<Utc>, market_price: f64) -> Option<Trade> {
        self.close_with_reason(timestamp, market_price, ExitReason::Signal)
    }

    /// Close the open position and tag the trade with `reason`.
    pub fn close_with_reason(
        &mut self,
        timestamp: DateTime<Utc>,
        market_price: f64,
        reason: ExitReason,
    ) -> Option<Trade> {
        let position = self.position.take()?;

        let exit_price = apply_slippage_exit(market_price, position.side, self.config.slippage_rate);
        let exit_fee = calculate_fee(position.notional, self.config.fee_rate);
        let exit_slippage = slippage_cost(exit_price, market_price, position.quantity);
        let pnl = position.price_pnl(exit_price) * position.leverage;

        self.equity += pnl - exit_fee - exit_slippage;
        self.total_fees += exit_fee;
        self.total_slippage += exit_slippage;

        let duration_hours =
            (timestamp - position.entry_timestamp).num_milliseconds() as f64 / 3_600_000.0;

        let trade = Trade {
            entry_timestamp: position.entry_timestamp,
            exit_timestamp: timestamp,
            side: position.side,
            entry_price: position.entry_price,
            exit_price,
            quantity: position.quantity,
            notional: position.notional,
            leverage: position.leverage,
            pnl,
            fees: position.entry_fee + exit_fee,
            slippage: position.entry_slippage + exit_slippage,
            duration_hours,
            exit_reason: reason,
            mae: position.mae.min(pnl),
            mfe: position.mfe.max(pnl),
        };

        if pnl > 0.0 {
            self.winning_trades += 1;
        } else {
            self.losing_trades += 1;
        }

        info!(
            side = %position.side,
            %reason,
            exit_price,
            pnl,
            fee = exit_fee,
            "closed position"
        );

        self.trades.push(trade.clone());
        Some(trade)
    }

    /// Mark the open position to `market_price` and apply forced exits.
    ///
    /// A margin call is checked first and wins over take-profit/stop-loss.
    /// Returns the trade when a forced exit happened; its `exit_reason`
    /// says which rule fired.
    pub fn update(&mut self, timestamp: DateTime<Utc>, market_price: f64) -> Option<Trade> {
        let position = self.position.as_mut()?;
        position.mark(market_price);

        let mark_equity = self.equity + position.leveraged_unrealized_pnl();
        let maintenance = position.notional * self.config.maintenance_margin;

        let reason = if mark_equity <= maintenance {
            warn!(
                mark_equity,
                maintenance,
                %timestamp,
                "margin call, liquidating position"
            );
            Some(ExitReason::MarginCall)
        } else if position.should_take_profit(market_price) {
            debug!(market_price, target = position.take_profit_price, "take-profit hit");
            Some(ExitReason::TakeProfit)
        } else if position.should_stop_loss(market_price) {
            debug!(market_price, target = position.stop_loss_price, "stop-loss hit");
            Some(ExitReason::StopLoss)
        } else {
            None
        };

        reason.and_then(|r| self.close_with_reason(timestamp, market_price, r))
    }

    /// Append the current mark equity to the equity curve.
    pub fn record_equity(&mut self, timestamp: DateTime<Utc>) {
        let equity = self.mark_equity();
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    pub fn summary(&self) -> PortfolioSummary {
        let total_trades = self.trades.len();
        let win_rate = if total_trades > 0 {
            self.winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let wins: Vec<f64> = self.trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
        let losses: Vec<f64> = self.trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl).collect();
        let avg = |v: &[f64]| {
            if v.is_empty() {
                0.0
            } else {
                v.iter().sum::<f64>() / v.len() as f64
            }
        };
        let avg_loss = avg(&losses);
        let profit_loss_ratio = if avg_loss != 0.0 {
            (avg(&wins) / avg_loss).abs()
        } else {
            f64::INFINITY
        };

        PortfolioSummary {
            initial_equity: self.config.initial_equity,
            current_equity: self.equity,
            total_return: (self.equity - self.config.initial_equity) / self.config.initial_equity,
            total_trades,
            winning_trades: self.winning_trades,
            losing_trades: self.losing_trades,
            win_rate,
            profit_loss_ratio,
            total_fees: self.total_fees,
            total_slippage: self.total_slippage,
            leverage: self.config.leverage,
            has_position: self.position.is_some(),
        }
    }
}
