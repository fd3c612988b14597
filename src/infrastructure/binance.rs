//! Binance spot kline source.

use crate::domain::market::Bar;
use crate::domain::ports::MarketDataSource;
use crate::infrastructure::http::HttpClientFactory;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use tracing::debug;

pub struct BinanceMarketDataSource {
    client: ClientWithMiddleware,
    base_url: String,
}

impl BinanceMarketDataSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            base_url,
        }
    }
}

#[async_trait]
impl MarketDataSource for BinanceMarketDataSource {
    async fn fetch_page(
        &self,
        symbol: &str,
        timeframe: &str,
        since: i64,
        limit: usize,
    ) -> Result<Vec<Bar>> {
        // "BTC/USDT" -> "BTCUSDT"
        let api_symbol = symbol.replace('/', "");
        let url = format!("{}/api/v3/klines", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", api_symbol.as_str()),
                ("interval", timeframe),
                ("startTime", &since.to_string()),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await
            .context("Failed to fetch klines from Binance")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance klines fetch failed: {}", error_text);
        }

        // Kline format: [open_time, open, high, low, close, volume, ...]
        let klines: Vec<serde_json::Value> = response
            .json()
            .await
            .context("Failed to parse Binance klines response")?;

        let bars: Vec<Bar> = klines
            .into_iter()
            .filter_map(|k| {
                let arr = k.as_array()?;
                if arr.len() < 6 {
                    return None;
                }
                let price = |i: usize| arr[i].as_str()?.parse::<Decimal>().ok();
                Some(Bar {
                    timestamp: arr[0].as_i64()?,
                    open: price(1)?,
                    high: price(2)?,
                    low: price(3)?,
                    close: price(4)?,
                    volume: price(5)?,
                })
            })
            .collect();

        debug!(
            "Fetched {} klines for {} {} since {}",
            bars.len(),
            api_symbol,
            timeframe,
            since
        );
        Ok(bars)
    }
}
