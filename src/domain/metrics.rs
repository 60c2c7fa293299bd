//! Performance metrics derived from the trade list, the equity curve and the
//! ledger's starting and realized final equity.
//!
//! `Metrics::compute` is pure and never fails: degenerate input (no trades,
//! fewer than two curve samples, zero variance) yields the documented
//! sentinel values instead.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use super::portfolio::EquityPoint;
use super::position::Trade;

const PERIODS_PER_YEAR: f64 = 252.0;
const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    /// |avg_win / avg_loss|. +inf with trades but no losers, 0 with no trades.
    pub profit_loss_ratio: f64,
    pub avg_win: f64,
    /// Mean PnL of losing trades (negative).
    pub avg_loss: f64,
    pub expected_return: f64,
    pub avg_duration_hours: f64,
    pub total_fees: f64,
    pub total_slippage: f64,

    /// Ledger starting equity, before any entry costs.
    pub initial_equity: f64,
    /// Ledger equity after the last trade closed.
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub duration_years: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub volatility: f64,

    /// Most negative (equity - running max) / running max, <= 0.
    pub max_drawdown: f64,
    /// Longest run of consecutive samples below the running max.
    pub max_drawdown_duration: usize,
    pub calmar_ratio: f64,
    pub var_95: f64,
    pub cvar_95: f64,

    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub monthly_pnl_mean: f64,
    pub monthly_pnl_std: f64,
    pub monthly_win_rate_mean: f64,
    pub monthly_win_rate_std: f64,
}

/// Trades grouped by the calendar month they were entered in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyStat {
    /// `YYYY-MM`
    pub month: String,
    pub trades: usize,
    pub pnl: f64,
    pub win_rate: f64,
}

impl Metrics {
    /// `initial_equity` and `final_equity` come from the ledger, not the curve:
    /// the first curve sample already carries bar-0 entry costs and the last
    /// one predates the end-of-data exit.
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_equity: f64,
        final_equity: f64,
    ) -> Self {
        let total_trades = trades.len();
        let wins: Vec<f64> = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
        let losses: Vec<f64> = trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl).collect();

        let win_rate = if total_trades > 0 {
            wins.len() as f64 / total_trades as f64
        } else {
            0.0
        };
        let avg_win = mean_f64(&wins);
        let avg_loss = mean_f64(&losses);
        let profit_loss_ratio = if total_trades == 0 {
            0.0
        } else if avg_loss != 0.0 {
            (avg_win / avg_loss).abs()
        } else {
            f64::INFINITY
        };

        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
        let durations: Vec<f64> = trades.iter().map(|t| t.duration_hours).collect();

        let total_return = if initial_equity > 0.0 {
            (final_equity - initial_equity) / initial_equity
        } else {
            0.0
        };

        let duration_years = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) => {
                (last.timestamp - first.timestamp).num_seconds() as f64 / SECONDS_PER_YEAR
            }
            _ => 0.0,
        };
        let annualized_return = annualize(total_return, duration_years);

        let equity: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let returns = period_returns(&equity);
        let std = std_dev(&returns);
        let mean_return = mean_f64(&returns);

        let sharpe_ratio = if std > 0.0 {
            mean_return / std * PERIODS_PER_YEAR.sqrt()
        } else {
            0.0
        };
        let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        let downside_std = std_dev(&downside);
        let sortino_ratio = if downside_std > 0.0 {
            mean_return / downside_std * PERIODS_PER_YEAR.sqrt()
        } else {
            0.0
        };
        let volatility = std * PERIODS_PER_YEAR.sqrt();

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&equity);
        let calmar_ratio = if max_drawdown != 0.0 {
            annualized_return / max_drawdown.abs()
        } else {
            0.0
        };
        let var_95 = percentile(&returns, 5.0);
        let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var_95).collect();
        let cvar_95 = mean_f64(&tail);

        let (max_consecutive_wins, max_consecutive_losses) = max_consecutive(trades);
        let monthly = monthly_breakdown(trades);
        let monthly_pnl: Vec<f64> = monthly.iter().map(|m| m.pnl).collect();
        let monthly_win_rate: Vec<f64> = monthly.iter().map(|m| m.win_rate).collect();

        Metrics {
            total_trades,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate,
            profit_loss_ratio,
            avg_win,
            avg_loss,
            expected_return: mean_f64(&pnls),
            avg_duration_hours: mean_f64(&durations),
            total_fees: trades.iter().map(|t| t.fees).sum(),
            total_slippage: trades.iter().map(|t| t.slippage).sum(),
            initial_equity,
            final_equity,
            total_return,
            annualized_return,
            duration_years,
            sharpe_ratio,
            sortino_ratio,
            volatility,
            max_drawdown,
            max_drawdown_duration,
            calmar_ratio,
            var_95,
            cvar_95,
            max_consecutive_wins,
            max_consecutive_losses,
            monthly_pnl_mean: mean_f64(&monthly_pnl),
            monthly_pnl_std: std_dev(&monthly_pnl),
            monthly_win_rate_mean: mean_f64(&monthly_win_rate),
            monthly_win_rate_std: std_dev(&monthly_win_rate),
        }
    }

    /// Flat name -> value mapping with stable key names.
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("total_trades", self.total_trades as f64),
            ("winning_trades", self.winning_trades as f64),
            ("losing_trades", self.losing_trades as f64),
            ("win_rate", self.win_rate),
            ("profit_loss_ratio", self.profit_loss_ratio),
            ("avg_win", self.avg_win),
            ("avg_loss", self.avg_loss),
            ("expected_return", self.expected_return),
            ("avg_duration_hours", self.avg_duration_hours),
            ("total_fees", self.total_fees),
            ("total_slippage", self.total_slippage),
            ("initial_equity", self.initial_equity),
            ("final_equity", self.final_equity),
            ("total_return", self.total_return),
            ("annualized_return", self.annualized_return),
            ("duration_years", self.duration_years),
            ("sharpe_ratio", self.sharpe_ratio),
            ("sortino_ratio", self.sortino_ratio),
            ("volatility", self.volatility),
            ("max_drawdown", self.max_drawdown),
            ("max_drawdown_duration", self.max_drawdown_duration as f64),
            ("calmar_ratio", self.calmar_ratio),
            ("var_95", self.var_95),
            ("cvar_95", self.cvar_95),
            ("max_consecutive_wins", self.max_consecutive_wins as f64),
            ("max_consecutive_losses", self.max_consecutive_losses as f64),
            ("monthly_pnl_mean", self.monthly_pnl_mean),
            ("monthly_pnl_std", self.monthly_pnl_std),
            ("monthly_win_rate_mean", self.monthly_win_rate_mean),
            ("monthly_win_rate_std", self.monthly_win_rate_std),
        ])
    }
}

/// Per-month trade statistics, ordered by month.
pub fn monthly_breakdown(trades: &[Trade]) -> Vec<MonthlyStat> {
    let mut groups: BTreeMap<(i32, u32), (usize, usize, f64)> = BTreeMap::new();
    for trade in trades {
        let key = (trade.entry_timestamp.year(), trade.entry_timestamp.month());
        let entry = groups.entry(key).or_insert((0, 0, 0.0));
        entry.0 += 1;
        if trade.is_winner() {
            entry.1 += 1;
        }
        entry.2 += trade.pnl;
    }

    groups
        .into_iter()
        .map(|((year, month), (count, won, pnl))| MonthlyStat {
            month: format!("{year:04}-{month:02}"),
            trades: count,
            pnl,
            win_rate: won as f64 / count as f64,
        })
        .collect()
}

fn annualize(total_return: f64, duration_years: f64) -> f64 {
    if duration_years <= 0.0 {
        return 0.0;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(1.0 / duration_years) - 1.0
}

/// Simple returns between consecutive samples; non-finite values dropped.
fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| w[1] / w[0] - 1.0)
        .filter(|r| r.is_finite())
        .collect()
}

fn compute_drawdown(equity: &[f64]) -> (f64, usize) {
    if equity.len() < 2 {
        return (0.0, 0);
    }

    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    let mut current = 0usize;
    let mut longest = 0usize;

    for &e in equity {
        peak = peak.max(e);
        let dd = if peak > 0.0 { (e - peak) / peak } else { 0.0 };
        if dd < 0.0 {
            current += 1;
            longest = longest.max(current);
            max_dd = max_dd.min(dd);
        } else {
            current = 0;
        }
    }

    (max_dd, longest)
}

/// Percentile with linear interpolation between closest ranks. 0 on empty input.
fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Longest (winning, losing) runs. A zero-PnL trade leaves both runs as they are.
fn max_consecutive(trades: &[Trade]) -> (usize, usize) {
    let (mut wins, mut losses) = (0usize, 0usize);
    let (mut max_wins, mut max_losses) = (0usize, 0usize);

    for trade in trades {
        if trade.is_winner() {
            wins += 1;
            losses = 0;
            max_wins = max_wins.max(wins);
        } else if trade.is_loser() {
            losses += 1;
            wins = 0;
            max_losses = max_losses.max(losses);
        }
    }
    (max_wins, max_losses)
}

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1). 0 for fewer than two values.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
