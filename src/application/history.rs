//! Bounded paginated bar fetch.
//!
//! Walks the market-data source cursor-wise and stops on an empty or
//! short page, or once the accumulated history crosses the hard cap.
//! The cap protects against misbehaving upstream pagination and must
//! hold no matter which adapter sits behind the port.

use crate::domain::market::Bar;
use crate::domain::ports::MarketDataSource;
use anyhow::Result;
use tracing::debug;

pub const PAGE_LIMIT: usize = 500;
pub const MAX_FETCH_BARS: usize = 5000;

pub async fn fetch_history(
    source: &dyn MarketDataSource,
    symbol: &str,
    timeframe: &str,
    since: i64,
) -> Result<Vec<Bar>> {
    let mut bars: Vec<Bar> = Vec::new();
    let mut cursor = since;

    loop {
        let page = source.fetch_page(symbol, timeframe, cursor, PAGE_LIMIT).await?;
        if page.is_empty() {
            break;
        }

        let exhausted = page.len() < PAGE_LIMIT;
        cursor = page.last().map(|b| b.timestamp + 1).unwrap_or(cursor);
        bars.extend(page);

        if exhausted || bars.len() > MAX_FETCH_BARS {
            break;
        }
    }

    debug!(
        "Fetched {} bars for {} {} since {}",
        bars.len(),
        symbol,
        timeframe,
        since
    );
    Ok(bars)
}
