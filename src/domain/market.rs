use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLCV observation for a fixed interval.
///
/// Timestamps are UTC milliseconds. A fetched history is ordered by
/// ascending timestamp with no duplicates; gaps are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Number of feature columns fed to the model.
pub const FEATURE_DIM: usize = 5;

/// Per-bar derived row. Every value is computed from bars at or before
/// `timestamp` (no look-ahead).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub timestamp: i64,
    /// Raw close, kept for the context summary; not a model input.
    pub close: f64,
    pub ret: f64,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub rsi: f64,
    pub volume: f64,
}

impl FeatureRow {
    /// Model input vector. Column order is fixed and part of the
    /// persisted-artifact contract.
    pub fn as_input(&self) -> [f64; FEATURE_DIM] {
        [self.ret, self.sma_fast, self.sma_slow, self.rsi, self.volume]
    }
}
