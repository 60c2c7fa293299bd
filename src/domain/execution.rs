//! Fill pricing for the margin account.
//!
//! Slippage always moves the fill against the position holder: entries pay
//! up (long) or receive less (short), exits receive less (long) or pay up
//! (short). Rates are fractions, e.g. 0.0005 for 5 bps.

use super::position::Side;

/// Fee charged on one leg: `notional * fee_rate`.
pub fn calculate_fee(notional: f64, fee_rate: f64) -> f64 {
    notional * fee_rate
}

/// Entry fill price after slippage.
/// Long: `market * (1 + rate)`. Short: `market * (1 - rate)`.
pub fn apply_slippage_entry(market_price: f64, side: Side, slippage_rate: f64) -> f64 {
    match side {
        Side::Long => market_price * (1.0 + slippage_rate),
        Side::Short => market_price * (1.0 - slippage_rate),
    }
}

/// Exit fill price after slippage.
/// Long: `market * (1 - rate)`. Short: `market * (1 + rate)`.
pub fn apply_slippage_exit(market_price: f64, side: Side, slippage_rate: f64) -> f64 {
    match side {
        Side::Long => market_price * (1.0 - slippage_rate),
        Side::Short => market_price * (1.0 + slippage_rate),
    }
}

/// Money lost to slippage on one leg.
pub fn slippage_cost(fill_price: f64, market_price: f64, quantity: f64) -> f64 {
    (fill_price - market_price).abs() * quantity
}

/// Take-profit and stop-loss prices for a fresh position.
///
/// The fractions are in leveraged terms: with leverage 10 a take-profit of
/// 0.25 is hit by a 2.5% favourable price move. A zero fraction yields a
/// zero price, which disables that exit.
pub fn target_prices(
    entry_price: f64,
    side: Side,
    leverage: f64,
    take_profit: f64,
    stop_loss: f64,
) -> (f64, f64) {
    let tp_move = take_profit / leverage;
    let sl_move = stop_loss / leverage;

    let take_profit_price = if take_profit > 0.0 {
        entry_price * (1.0 + side.sign() * tp_move)
    } else {
        0.0
    };
    let stop_loss_price = if stop_loss > 0.0 {
        entry_price * (1.0 - side.sign() * sl_move)
    } else {
        0.0
    };

    (take_profit_price, stop_loss_price)
}
