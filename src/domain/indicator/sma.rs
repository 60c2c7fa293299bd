//! Simple Moving Average.
//!
//! SMA[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) values are `None`.

use super::{IndicatorSeries, IndicatorType};

pub fn calculate_sma(values: &[f64], period: usize) -> IndicatorSeries {
    let mut out = Vec::with_capacity(values.len());

    if period > 0 {
        let mut sum = 0.0;
        for (i, value) in values.iter().enumerate() {
            sum += value;
            if i >= period {
                sum -= values[i - period];
            }
            if i + 1 >= period {
                out.push(Some(sum / period as f64));
            } else {
                out.push(None);
            }
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values: out,
    }
}
