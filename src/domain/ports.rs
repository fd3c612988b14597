use crate::domain::market::Bar;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Dimension of the embedding vectors handed to the vector store.
/// Matches the text-embedding-3-small output and the degraded
/// zero-vector mode.
pub const EMBEDDING_DIM: usize = 1536;

/// Cursor-paginated market data source.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// One page of bars for `symbol`/`timeframe`, ascending by
    /// timestamp, starting at or after `since` (UTC milliseconds),
    /// at most `limit` rows.
    async fn fetch_page(
        &self,
        symbol: &str,
        timeframe: &str,
        since: i64,
        limit: usize,
    ) -> Result<Vec<Bar>>;
}

/// Single-slot, last-write-wins storage for the trained model.
///
/// A reader concurrent with `write` must only ever observe a fully
/// written artifact (atomic replace at the storage boundary).
#[async_trait]
pub trait ModelArtifactStore: Send + Sync {
    async fn write(&self, bytes: &[u8]) -> Result<()>;

    /// `None` when no artifact has ever been saved. Never an error for
    /// a merely missing artifact.
    async fn read(&self) -> Result<Option<Vec<u8>>>;

    /// Human-readable reference to the slot, for training summaries.
    fn location(&self) -> String;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Fixed-length embedding for `text`. Unconfigured providers return
    /// a zero vector rather than failing.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRow {
    pub symbol: String,
    pub timeframe: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent per logical key (symbol, timeframe).
    async fn upsert(&self, row: &EmbeddingRow) -> Result<()>;
}
