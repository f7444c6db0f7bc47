//! Shared indicator math.
//!
//! Everything here works on `f64` closes and returns `None` instead of
//! propagating NaN or infinity: insufficient data and zero denominators
//! surface as "no reading", which strategies treat as neutral.

/// Arithmetic mean. `None` on an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation. `None` on an empty slice.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    let sd = variance.sqrt();
    if sd.is_finite() {
        Some(sd)
    } else {
        None
    }
}

/// Simple moving average series over a sliding window.
pub fn sma(values: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || values.len() < period {
        return None;
    }
    let mut result = Vec::with_capacity(values.len() - period + 1);
    let mut sum: f64 = values.iter().take(period).sum();
    result.push(sum / period as f64);
    for i in period..values.len() {
        sum = sum - values[i - period] + values[i];
        result.push(sum / period as f64);
    }
    Some(result)
}

/// Normalized slope of a series: per-step fractional change from first to
/// last value. `None` when too short or the first value is zero.
pub fn slope(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let first = values[0];
    if first == 0.0 {
        return None;
    }
    let steps = (values.len() - 1) as f64;
    let s = (values[values.len() - 1] - first) / first / steps;
    if s.is_finite() {
        Some(s)
    } else {
        None
    }
}

/// Wilder-smoothed RSI series. Entry `i` corresponds to close
/// `period + 1 + i`; needs at least `period + 2` closes to produce two
/// values (enough to detect a crossing).
pub fn rsi_series(closes: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || closes.len() < period + 2 {
        return None;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = deltas[..period].iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss = deltas[..period].iter().filter(|d| **d < 0.0).sum::<f64>().abs()
        / period as f64;

    let mut series = Vec::with_capacity(deltas.len() - period);
    for delta in &deltas[period..] {
        let (gain, loss) = if *delta > 0.0 {
            (*delta, 0.0)
        } else {
            (0.0, -*delta)
        };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;

        let value = if avg_loss.abs() < f64::EPSILON {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        };
        series.push(value);
    }

    Some(series)
}

/// Latest RSI value.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    rsi_series(closes, period).and_then(|s| s.last().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        assert!((std_dev(&values).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(mean(&[]), None);
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn test_sma_sliding_window() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&values, 3), Some(vec![2.0, 3.0, 4.0]));
        assert_eq!(sma(&values, 6), None);
    }

    #[test]
    fn test_slope_direction() {
        assert!(slope(&[100.0, 101.0, 102.0]).unwrap() > 0.0);
        assert!(slope(&[102.0, 101.0, 100.0]).unwrap() < 0.0);
        assert_eq!(slope(&[100.0]), None);
        assert_eq!(slope(&[0.0, 1.0]), None);
    }

    #[test]
    fn test_rsi_extremes() {
        // Monotonically rising closes push RSI toward 100.
        let rising: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert!(rsi(&rising, 14).unwrap() > 90.0);

        // Monotonically falling closes push it toward 0.
        let falling: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        assert!(rsi(&falling, 14).unwrap() < 10.0);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&closes, 14), None);
    }
}
