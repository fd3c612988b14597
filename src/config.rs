use crate::application::model::TrainConfig;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Mock,
    Binance,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Mode::Mock),
            "binance" => Ok(Mode::Binance),
            _ => anyhow::bail!("Invalid MODE: {}. Must be 'mock' or 'binance'", s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub symbol: String,
    pub timeframe: String,
    pub lookback_hours: i64,
    // Training
    pub train_epochs: usize,
    pub train_batch_size: usize,
    pub learning_rate: f64,
    pub train_seed: Option<u64>,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub enable_variational_calibration: bool,
    // Persistence
    pub model_path: String,
    // External services
    pub binance_base_url: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_embedding_model: String,
    pub supabase_url: String,
    pub supabase_key: String,
    pub supabase_table: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mode_str = env::var("MODE").unwrap_or_else(|_| "mock".to_string());
        let mode = Mode::from_str(&mode_str)?;

        let symbol = env::var("SYMBOL").unwrap_or_else(|_| "BTC/USDT".to_string());
        let timeframe = env::var("TIMEFRAME").unwrap_or_else(|_| "1h".to_string());

        let lookback_hours = env::var("LOOKBACK_HOURS")
            .unwrap_or_else(|_| "720".to_string())
            .parse::<i64>()
            .context("Failed to parse LOOKBACK_HOURS")?;

        let train_epochs = env::var("TRAIN_EPOCHS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<usize>()
            .context("Failed to parse TRAIN_EPOCHS")?;

        let train_batch_size = env::var("TRAIN_BATCH_SIZE")
            .unwrap_or_else(|_| "32".to_string())
            .parse::<usize>()
            .context("Failed to parse TRAIN_BATCH_SIZE")?;

        let learning_rate = env::var("LEARNING_RATE")
            .unwrap_or_else(|_| "0.0007".to_string())
            .parse::<f64>()
            .context("Failed to parse LEARNING_RATE")?;

        let train_seed = match env::var("TRAIN_SEED") {
            Ok(raw) => Some(raw.parse::<u64>().context("Failed to parse TRAIN_SEED")?),
            Err(_) => None,
        };

        let hidden_size = env::var("HIDDEN_SIZE")
            .unwrap_or_else(|_| "64".to_string())
            .parse::<usize>()
            .context("Failed to parse HIDDEN_SIZE")?;

        let num_layers = env::var("NUM_LAYERS")
            .unwrap_or_else(|_| "2".to_string())
            .parse::<usize>()
            .context("Failed to parse NUM_LAYERS")?;

        let enable_variational_calibration = env::var("ENABLE_VARIATIONAL_CALIBRATION")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let model_path =
            env::var("MODEL_PATH").unwrap_or_else(|_| "data/titan_lstm.json".to_string());

        let binance_base_url = env::var("BINANCE_BASE_URL")
            .unwrap_or_else(|_| "https://api.binance.com".to_string());

        let openai_api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        let openai_base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_embedding_model = env::var("OPENAI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());

        let supabase_url = env::var("SUPABASE_URL").unwrap_or_default();
        // Service role wins when both keys are set.
        let supabase_key = env::var("SUPABASE_SERVICE_ROLE")
            .or_else(|_| env::var("SUPABASE_ANON_KEY"))
            .unwrap_or_default();
        let supabase_table = env::var("SUPABASE_EMBEDDINGS_TABLE")
            .unwrap_or_else(|_| "titan_embeddings".to_string());

        Ok(Config {
            mode,
            symbol,
            timeframe,
            lookback_hours,
            train_epochs,
            train_batch_size,
            learning_rate,
            train_seed,
            hidden_size,
            num_layers,
            enable_variational_calibration,
            model_path,
            binance_base_url,
            openai_api_key,
            openai_base_url,
            openai_embedding_model,
            supabase_url,
            supabase_key,
            supabase_table,
        })
    }

    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            epochs: self.train_epochs,
            batch_size: self.train_batch_size,
            learning_rate: self.learning_rate,
            seed: self.train_seed,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Mock,
            symbol: "BTC/USDT".to_string(),
            timeframe: "1h".to_string(),
            lookback_hours: 720,
            train_epochs: 3,
            train_batch_size: 32,
            learning_rate: 0.0007,
            train_seed: None,
            hidden_size: 64,
            num_layers: 2,
            enable_variational_calibration: true,
            model_path: "data/titan_lstm.json".to_string(),
            binance_base_url: "https://api.binance.com".to_string(),
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com".to_string(),
            openai_embedding_model: "text-embedding-3-small".to_string(),
            supabase_url: String::new(),
            supabase_key: String::new(),
            supabase_table: "titan_embeddings".to_string(),
        }
    }
}
