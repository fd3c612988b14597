//! Feature Engine
//!
//! Turns raw bars into the per-bar feature table the model consumes:
//! simple returns, fast/slow trailing SMAs and an RSI-style momentum
//! oscillator. Pure function of its input; no side effects.

use crate::domain::market::{Bar, FeatureRow};
use rust_decimal::prelude::ToPrimitive;

/// Guards the RS ratio against division by zero on flat segments.
const RSI_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct FeatureEngine {
    pub fast_window: usize,
    pub slow_window: usize,
    pub rsi_period: usize,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self {
            fast_window: 10,
            slow_window: 30,
            rsi_period: 14,
        }
    }
}

impl FeatureEngine {
    /// Computes the feature table.
    ///
    /// Fewer bars than the slow-SMA window means no row can resolve all
    /// of its rolling dependencies, so the result is empty — a valid
    /// outcome, not an error. Otherwise the first bar is dropped (the
    /// oscillator has no delta there) and the output holds one row per
    /// remaining bar.
    pub fn compute(&self, bars: &[Bar]) -> Vec<FeatureRow> {
        if bars.len() < self.slow_window {
            return Vec::new();
        }

        let closes: Vec<f64> = bars
            .iter()
            .map(|b| b.close.to_f64().unwrap_or(0.0))
            .collect();
        let volumes: Vec<f64> = bars
            .iter()
            .map(|b| b.volume.to_f64().unwrap_or(0.0))
            .collect();

        let returns = simple_returns(&closes);
        let sma_fast = trailing_mean_backfilled(&closes, self.fast_window);
        let sma_slow = trailing_mean_backfilled(&closes, self.slow_window);
        let rsi = self.rsi(&closes);

        // Index 0 is the oscillator warm-up row; it never survives.
        (1..bars.len())
            .map(|t| FeatureRow {
                timestamp: bars[t].timestamp,
                close: closes[t],
                ret: returns[t],
                sma_fast: sma_fast[t],
                sma_slow: sma_slow[t],
                rsi: rsi[t],
                volume: volumes[t],
            })
            .collect()
    }

    /// RSI over exponentially smoothed up/down deltas, `alpha = 1/period`,
    /// seeded at the first delta. Bounded to [0, 100] up to the epsilon
    /// bias in the RS ratio.
    fn rsi(&self, closes: &[f64]) -> Vec<f64> {
        let alpha = 1.0 / self.rsi_period as f64;
        let mut out = vec![0.0; closes.len()];
        let mut ma_up = 0.0;
        let mut ma_down = 0.0;

        for t in 1..closes.len() {
            let delta = closes[t] - closes[t - 1];
            let up = delta.max(0.0);
            let down = (-delta).max(0.0);

            if t == 1 {
                ma_up = up;
                ma_down = down;
            } else {
                ma_up = alpha * up + (1.0 - alpha) * ma_up;
                ma_down = alpha * down + (1.0 - alpha) * ma_down;
            }

            let rs = ma_up / (ma_down + RSI_EPSILON);
            out[t] = 100.0 - 100.0 / (1.0 + rs);
        }

        out
    }
}

/// `ret[0] = 0`, `ret[t] = close[t] / close[t-1] - 1`.
fn simple_returns(closes: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; closes.len()];
    for t in 1..closes.len() {
        if closes[t - 1] != 0.0 {
            out[t] = closes[t] / closes[t - 1] - 1.0;
        }
    }
    out
}

/// Trailing mean over `window` values. Positions before the first full
/// window are back-filled with the first full-window value, so no
/// leading gap survives.
fn trailing_mean_backfilled(values: &[f64], window: usize) -> Vec<f64> {
    debug_assert!(window > 0 && values.len() >= window);
    let mut out = vec![0.0; values.len()];
    let mut sum: f64 = values[..window].iter().sum();
    out[window - 1] = sum / window as f64;

    for t in window..values.len() {
        sum += values[t] - values[t - window];
        out[t] = sum / window as f64;
    }

    let first_full = out[window - 1];
    for v in out.iter_mut().take(window - 1) {
        *v = first_full;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn bar(ts: i64, close: f64) -> Bar {
        let d = Decimal::from_f64_retain(close).unwrap();
        Bar {
            timestamp: ts,
            open: d,
            high: d,
            low: d,
            close: d,
            volume: Decimal::from_f64_retain(10.0).unwrap(),
        }
    }

    fn rising_bars(n: usize) -> Vec<Bar> {
        (0..n).map(|i| bar(i as i64 * 3_600_000, 100.0 + i as f64)).collect()
    }

    #[test]
    fn too_few_bars_yields_empty_table() {
        let engine = FeatureEngine::default();
        assert!(engine.compute(&[]).is_empty());
        assert!(engine.compute(&rising_bars(29)).is_empty());
    }

    #[test]
    fn output_is_shorter_than_input() {
        let engine = FeatureEngine::default();
        let bars = rising_bars(40);
        let rows = engine.compute(&bars);
        assert_eq!(rows.len(), 39);
    }

    #[test]
    fn monotonic_closes_give_positive_returns() {
        let engine = FeatureEngine::default();
        let rows = engine.compute(&rising_bars(40));
        assert!(rows.iter().all(|r| r.ret > 0.0));
    }

    #[test]
    fn rsi_stays_within_bounds() {
        let engine = FeatureEngine::default();
        // Sawtooth closes exercise both up and down deltas.
        let bars: Vec<Bar> = (0..60)
            .map(|i| bar(i as i64, 100.0 + if i % 2 == 0 { 3.0 } else { -2.0 } * (i % 7) as f64))
            .collect();
        let rows = engine.compute(&bars);
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|r| r.rsi >= 0.0 && r.rsi <= 100.0));
    }

    #[test]
    fn rsi_saturates_at_hundred_on_straight_rallies() {
        let engine = FeatureEngine::default();
        let rows = engine.compute(&rising_bars(60));
        let last = rows.last().unwrap();
        assert!(last.rsi > 99.0);
    }

    #[test]
    fn sma_backfill_has_no_leading_gap() {
        let closes: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let sma = trailing_mean_backfilled(&closes, 4);
        // First full window mean is (0+1+2+3)/4 = 1.5, back-filled left.
        assert_eq!(sma[0], 1.5);
        assert_eq!(sma[2], 1.5);
        assert_eq!(sma[3], 1.5);
        assert_eq!(sma[9], (6.0 + 7.0 + 8.0 + 9.0) / 4.0);
    }

    #[test]
    fn no_look_ahead_in_prefix() {
        // Features for the first k bars must not change when later bars
        // are appended.
        let engine = FeatureEngine::default();
        let long = rising_bars(50);
        let short_rows = engine.compute(&long[..40]);
        let long_rows = engine.compute(&long);
        assert_eq!(&long_rows[..short_rows.len()], &short_rows[..]);
    }
}
