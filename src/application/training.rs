//! End-to-end training run.
//!
//! Fetches history, engineers features, builds labelled sequences,
//! trains the classifier, calibrates the decision threshold on the
//! training predictions, persists the model artifact and upserts an
//! embedded context summary. A run-level guard rejects overlapping
//! runs instead of queueing them.

use crate::application::calibration::ThresholdCalibrator;
use crate::application::context::ContextSummary;
use crate::application::features::FeatureEngine;
use crate::application::history::fetch_history;
use crate::application::model::{SequenceClassifier, TrainConfig};
use crate::application::sequences::build_sequences;
use crate::config::Config;
use crate::domain::market::{FeatureRow, FEATURE_DIM};
use crate::domain::ports::{
    EmbeddingProvider, EmbeddingRow, MarketDataSource, ModelArtifactStore, VectorStore,
    EMBEDDING_DIM,
};
use anyhow::Result;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Sequence window length in bars.
pub const WINDOW_LENGTH: usize = 30;
/// Minimum labelled sequences required before training starts.
pub const MIN_SEQUENCES: usize = 100;
/// Iteration budget handed to the threshold search.
pub const CALIBRATION_STEPS: usize = 40;
/// Starting point for threshold calibration.
pub const INITIAL_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub loss: f64,
    pub threshold: f64,
    pub artifact: String,
}

#[derive(Debug, Clone, Serialize)]
pub enum TrainingOutcome {
    Completed(TrainingSummary),
    NotEnoughData { sequences: usize },
    AlreadyRunning,
}

pub struct TrainingOrchestrator {
    config: Config,
    features: FeatureEngine,
    calibrator: ThresholdCalibrator,
    market_data: Arc<dyn MarketDataSource>,
    artifacts: Arc<dyn ModelArtifactStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    run_guard: Mutex<()>,
}

impl TrainingOrchestrator {
    pub fn new(
        config: Config,
        market_data: Arc<dyn MarketDataSource>,
        artifacts: Arc<dyn ModelArtifactStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        let calibrator = ThresholdCalibrator::from_config(config.enable_variational_calibration);
        Self {
            config,
            features: FeatureEngine::default(),
            calibrator,
            market_data,
            artifacts,
            embeddings,
            vector_store,
            run_guard: Mutex::new(()),
        }
    }

    pub async fn run_training(&self) -> Result<TrainingOutcome> {
        let Ok(_guard) = self.run_guard.try_lock() else {
            warn!("Training already in progress, rejecting run");
            return Ok(TrainingOutcome::AlreadyRunning);
        };

        let symbol = self.config.symbol.as_str();
        let timeframe = self.config.timeframe.as_str();
        let since = Utc::now().timestamp_millis() - self.config.lookback_hours * 3_600_000;

        info!("Starting training run for {} {}", symbol, timeframe);
        let bars = fetch_history(self.market_data.as_ref(), symbol, timeframe, since).await?;
        let rows = self.features.compute(&bars);
        let set = build_sequences(&rows, WINDOW_LENGTH);

        if set.len() < MIN_SEQUENCES {
            info!(
                "Only {} sequences from {} bars, need {}",
                set.len(),
                bars.len(),
                MIN_SEQUENCES
            );
            return Ok(TrainingOutcome::NotEnoughData {
                sequences: set.len(),
            });
        }

        let mut rng: StdRng = match self.config.train_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut model = SequenceClassifier::new(
            FEATURE_DIM,
            self.config.hidden_size,
            self.config.num_layers,
            &mut rng,
        );

        let train_cfg: TrainConfig = self.config.train_config();
        let report = model.train(&set.inputs, &set.labels, &train_cfg)?;
        info!(
            "Trained on {} sequences, final loss {:.6}",
            report.samples, report.loss
        );

        self.artifacts.write(&model.to_bytes()?).await?;

        let preds = model.predict(&set.inputs)?;
        let labels = &set.labels;
        let mut misclassification = |t: f64| {
            let wrong = preds
                .iter()
                .zip(labels.iter())
                .filter(|(p, y)| (**p >= t) != (**y > 0.5))
                .count();
            wrong as f64 / preds.len() as f64
        };
        let threshold =
            self.calibrator
                .calibrate(INITIAL_THRESHOLD, &mut misclassification, CALIBRATION_STEPS);
        info!("Calibrated threshold {:.4}", threshold);

        self.store_context(symbol, timeframe, &rows).await;

        Ok(TrainingOutcome::Completed(TrainingSummary {
            loss: report.loss,
            threshold,
            artifact: self.artifacts.location(),
        }))
    }

    /// Embeds and upserts the context summary. Failures degrade the run
    /// but never fail it: an embedding error falls back to a zero
    /// vector, a store error is logged and dropped.
    async fn store_context(&self, symbol: &str, timeframe: &str, rows: &[FeatureRow]) {
        let summary = ContextSummary::new(symbol, timeframe, rows);

        let embedding = match self.embeddings.embed(&summary.text).await {
            Ok(vector) => vector,
            Err(err) => {
                warn!("Embedding failed, storing zero vector: {err:#}");
                vec![0.0; EMBEDDING_DIM]
            }
        };

        let row = EmbeddingRow {
            symbol: summary.symbol,
            timeframe: summary.timeframe,
            text: summary.text,
            embedding,
        };
        if let Err(err) = self.vector_store.upsert(&row).await {
            warn!("Vector store upsert failed: {err:#}");
        }
    }
}
