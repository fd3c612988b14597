//! Plain-text market context for embedding.

use crate::domain::market::FeatureRow;

/// Number of trailing feature rows folded into the summary.
pub const CONTEXT_ROWS: usize = 64;

/// Market snapshot rendered as a single line suitable for an embedding
/// model: symbol, timeframe, then closes and RSI values at two
/// decimals.
#[derive(Debug, Clone)]
pub struct ContextSummary {
    pub symbol: String,
    pub timeframe: String,
    pub text: String,
}

impl ContextSummary {
    pub fn new(symbol: &str, timeframe: &str, rows: &[FeatureRow]) -> Self {
        let tail = &rows[rows.len().saturating_sub(CONTEXT_ROWS)..];

        let closes = tail
            .iter()
            .map(|r| format!("{:.2}", r.close))
            .collect::<Vec<_>>()
            .join(", ");
        let rsi = tail
            .iter()
            .map(|r| format!("{:.2}", r.rsi))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            text: format!("Symbol={symbol} tf={timeframe} close_tail=[{closes}] rsi_tail=[{rsi}]"),
        }
    }
}
