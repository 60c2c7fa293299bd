//! Position and closed-trade records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Ok(Side::Long),
            "short" | "sell" => Ok(Side::Short),
            other => Err(format!("unknown side '{}'", other)),
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Explicit close requested by the caller.
    Signal,
    /// Implicit close performed by `open` before entering the new position.
    Reversal,
    TakeProfit,
    StopLoss,
    MarginCall,
    /// Forced close after the last bar.
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::Signal => "signal",
            ExitReason::Reversal => "reversal",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::MarginCall => "margin_call",
            ExitReason::EndOfData => "end_of_data",
        };
        f.write_str(s)
    }
}

/// The single open position of a margin account.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub quantity: f64,
    pub notional: f64,
    pub margin: f64,
    pub leverage: f64,
    pub entry_timestamp: DateTime<Utc>,
    /// Raw price PnL at the last mark, not leverage-scaled.
    pub unrealized_pnl: f64,
    /// 0.0 disables the take-profit exit.
    pub take_profit_price: f64,
    /// 0.0 disables the stop-loss exit.
    pub stop_loss_price: f64,
    pub entry_fee: f64,
    pub entry_slippage: f64,
    /// Worst leveraged PnL seen while open (<= 0).
    pub mae: f64,
    /// Best leveraged PnL seen while open (>= 0).
    pub mfe: f64,
}

impl Position {
    /// Raw price PnL at `price`: `(price - entry) * qty` for longs, mirrored for shorts.
    pub fn price_pnl(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price) * self.quantity
    }

    /// Unrealized PnL scaled by leverage, the amount the account equity moves by.
    pub fn leveraged_unrealized_pnl(&self) -> f64 {
        self.unrealized_pnl * self.leverage
    }

    /// Recompute the mark and excursion extremes at `price`.
    pub fn mark(&mut self, price: f64) {
        self.unrealized_pnl = self.price_pnl(price);
        let leveraged = self.leveraged_unrealized_pnl();
        self.mae = self.mae.min(leveraged);
        self.mfe = self.mfe.max(leveraged);
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        if self.take_profit_price == 0.0 {
            return false;
        }
        match self.side {
            Side::Long => price >= self.take_profit_price,
            Side::Short => price <= self.take_profit_price,
        }
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        if self.stop_loss_price == 0.0 {
            return false;
        }
        match self.side {
            Side::Long => price <= self.stop_loss_price,
            Side::Short => price >= self.stop_loss_price,
        }
    }
}

/// A closed position. Appended once per close and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub entry_timestamp: DateTime<Utc>,
    pub exit_timestamp: DateTime<Utc>,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub notional: f64,
    pub leverage: f64,
    /// Realized PnL, already leverage-scaled, before fees and slippage.
    pub pnl: f64,
    /// Entry plus exit fee.
    pub fees: f64,
    /// Entry plus exit slippage cost.
    pub slippage: f64,
    pub duration_hours: f64,
    pub exit_reason: ExitReason,
    pub mae: f64,
    pub mfe: f64,
}

impl Trade {
    /// Equity change caused by this trade over its whole life.
    pub fn net_pnl(&self) -> f64 {
        self.pnl - self.fees - self.slippage
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
    }

    fn sample_long_position() -> Position {
        Position {
            side: Side::Long,
            entry_price: 50.0,
            quantity: 100.0,
            notional: 5000.0,
            margin: 500.0,
            leverage: 10.0,
            entry_timestamp: ts(),
            unrealized_pnl: 0.0,
            take_profit_price: 60.0,
            stop_loss_price: 45.0,
            entry_fee: 0.0,
            entry_slippage: 0.0,
            mae: 0.0,
            mfe: 0.0,
        }
    }

    fn sample_short_position() -> Position {
        Position {
            side: Side::Short,
            entry_price: 100.0,
            quantity: 100.0,
            notional: 10_000.0,
            margin: 1000.0,
            take_profit_price: 80.0,
            stop_loss_price: 110.0,
            ..sample_long_position()
        }
    }

    #[test]
    fn side_display_and_parse() {
        assert_eq!(Side::Long.to_string(), "long");
        assert_eq!(Side::Short.to_string(), "short");
        assert_eq!("LONG".parse::<Side>().unwrap(), Side::Long);
        assert_eq!("sell".parse::<Side>().unwrap(), Side::Short);
        assert!("flat".parse::<Side>().is_err());
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Long.opposite(), Side::Short);
        assert_eq!(Side::Short.opposite(), Side::Long);
    }

    #[test]
    fn price_pnl_long_and_short() {
        let long = sample_long_position();
        assert!((long.price_pnl(55.0) - 500.0).abs() < f64::EPSILON);
        assert!((long.price_pnl(45.0) + 500.0).abs() < f64::EPSILON);

        let short = sample_short_position();
        assert!((short.price_pnl(90.0) - 1000.0).abs() < f64::EPSILON);
        assert!((short.price_pnl(110.0) + 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mark_tracks_excursions() {
        let mut pos = sample_long_position();
        pos.mark(52.0);
        pos.mark(48.0);
        pos.mark(51.0);
        assert!((pos.unrealized_pnl - 100.0).abs() < 1e-9);
        assert!((pos.mfe - 2000.0).abs() < 1e-9);
        assert!((pos.mae + 2000.0).abs() < 1e-9);
    }

    #[test]
    fn stop_loss_long_triggered() {
        let pos = sample_long_position();
        assert!(pos.should_stop_loss(44.0));
        assert!(pos.should_stop_loss(45.0));
        assert!(!pos.should_stop_loss(46.0));
    }

    #[test]
    fn stop_loss_short_triggered() {
        let pos = sample_short_position();
        assert!(pos.should_stop_loss(111.0));
        assert!(pos.should_stop_loss(110.0));
        assert!(!pos.should_stop_loss(109.0));
    }

    #[test]
    fn take_profit_long_triggered() {
        let pos = sample_long_position();
        assert!(pos.should_take_profit(60.0));
        assert!(!pos.should_take_profit(59.0));
    }

    #[test]
    fn take_profit_short_triggered() {
        let pos = sample_short_position();
        assert!(pos.should_take_profit(80.0));
        assert!(!pos.should_take_profit(81.0));
    }

    #[test]
    fn zero_targets_disable_exits() {
        let mut pos = sample_long_position();
        pos.take_profit_price = 0.0;
        pos.stop_loss_price = 0.0;
        assert!(!pos.should_take_profit(1_000_000.0));
        assert!(!pos.should_stop_loss(0.0001));
    }

    #[test]
    fn trade_net_pnl() {
        let trade = Trade {
            entry_timestamp: ts(),
            exit_timestamp: ts(),
            side: Side::Long,
            entry_price: 100.0,
            exit_price: 110.0,
            quantity: 1.0,
            notional: 100.0,
            leverage: 10.0,
            pnl: 100.0,
            fees: 2.0,
            slippage: 0.5,
            duration_hours: 0.0,
            exit_reason: ExitReason::Signal,
            mae: 0.0,
            mfe: 100.0,
        };
        assert!((trade.net_pnl() - 97.5).abs() < 1e-12);
        assert!(trade.is_winner());
        assert!(!trade.is_loser());
    }

    #[test]
    fn exit_reason_display() {
        assert_eq!(ExitReason::MarginCall.to_string(), "margin_call");
        assert_eq!(ExitReason::EndOfData.to_string(), "end_of_data");
    }
}
