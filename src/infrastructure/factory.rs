use crate::config::{Config, Mode};
use crate::domain::ports::{EmbeddingProvider, MarketDataSource, ModelArtifactStore, VectorStore};
use crate::infrastructure::artifacts::FsModelArtifactStore;
use crate::infrastructure::binance::BinanceMarketDataSource;
use crate::infrastructure::embeddings::OpenAiEmbeddingProvider;
use crate::infrastructure::mock::MockMarketDataSource;
use crate::infrastructure::vector_store::SupabaseVectorStore;
use std::sync::Arc;

const MOCK_DATA_SEED: u64 = 42;

pub struct ServiceFactory;

impl ServiceFactory {
    pub fn create_market_data(config: &Config) -> Arc<dyn MarketDataSource> {
        match config.mode {
            Mode::Mock => Arc::new(MockMarketDataSource::new(MOCK_DATA_SEED)),
            Mode::Binance => Arc::new(BinanceMarketDataSource::new(
                config.binance_base_url.clone(),
            )),
        }
    }

    pub fn create_artifact_store(config: &Config) -> Arc<dyn ModelArtifactStore> {
        Arc::new(FsModelArtifactStore::new(config.model_path.clone()))
    }

    pub fn create_embedding_provider(config: &Config) -> Arc<dyn EmbeddingProvider> {
        Arc::new(OpenAiEmbeddingProvider::new(
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
            config.openai_embedding_model.clone(),
        ))
    }

    pub fn create_vector_store(config: &Config) -> Arc<dyn VectorStore> {
        Arc::new(SupabaseVectorStore::new(
            config.supabase_url.clone(),
            config.supabase_key.clone(),
            config.supabase_table.clone(),
        ))
    }
}
