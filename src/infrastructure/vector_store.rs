//! Supabase vector storage over PostgREST.

use crate::domain::ports::{EmbeddingRow, VectorStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

pub struct SupabaseVectorStore {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl SupabaseVectorStore {
    pub fn new(base_url: String, api_key: String, table: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url,
            api_key,
            table,
        }
    }
}

#[async_trait]
impl VectorStore for SupabaseVectorStore {
    async fn upsert(&self, row: &EmbeddingRow) -> Result<()> {
        if self.base_url.is_empty() {
            warn!("No Supabase URL configured, skipping embedding upsert");
            return Ok(());
        }

        let url = format!("{}/rest/v1/{}", self.base_url, self.table);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&[row])
            .send()
            .await
            .context("Failed to reach Supabase")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Supabase upsert failed: {}", error_text);
        }

        debug!("Upserted embedding for {} {}", row.symbol, row.timeframe);
        Ok(())
    }
}
