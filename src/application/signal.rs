//! On-demand inference.
//!
//! Loads the persisted classifier, rebuilds features over fresh
//! history and scores the most recent sequence. Falls back to a hold
//! signal when no model exists or the history is too short; a corrupt
//! artifact is an error, not a hold.

use crate::application::features::FeatureEngine;
use crate::application::history::fetch_history;
use crate::application::model::SequenceClassifier;
use crate::application::sequences::build_sequences;
use crate::application::training::WINDOW_LENGTH;
use crate::config::Config;
use crate::domain::ports::{MarketDataSource, ModelArtifactStore};
use crate::domain::signal::{HoldReason, Signal};
use anyhow::Result;
use chrono::Utc;
use ndarray::Axis;
use std::sync::Arc;
use tracing::info;

/// Inference always cuts at 0.5, independent of the calibrated
/// training threshold.
pub const INFERENCE_THRESHOLD: f64 = 0.5;

pub struct SignalService {
    config: Config,
    features: FeatureEngine,
    market_data: Arc<dyn MarketDataSource>,
    artifacts: Arc<dyn ModelArtifactStore>,
}

impl SignalService {
    pub fn new(
        config: Config,
        market_data: Arc<dyn MarketDataSource>,
        artifacts: Arc<dyn ModelArtifactStore>,
    ) -> Self {
        Self {
            config,
            features: FeatureEngine::default(),
            market_data,
            artifacts,
        }
    }

    /// Overrides fall back to the configured symbol/timeframe.
    pub async fn generate_signal(
        &self,
        symbol: Option<&str>,
        timeframe: Option<&str>,
    ) -> Result<Signal> {
        let symbol = symbol.unwrap_or(&self.config.symbol);
        let timeframe = timeframe.unwrap_or(&self.config.timeframe);

        let Some(bytes) = self.artifacts.read().await? else {
            info!("No model artifact, holding");
            return Ok(Signal::hold(symbol, timeframe, HoldReason::ModelUnavailable));
        };
        let model = SequenceClassifier::from_bytes(&bytes)?;

        let since = Utc::now().timestamp_millis() - self.config.lookback_hours * 3_600_000;
        let bars = fetch_history(self.market_data.as_ref(), symbol, timeframe, since).await?;
        let rows = self.features.compute(&bars);
        let set = build_sequences(&rows, WINDOW_LENGTH);

        if set.is_empty() {
            info!("No sequences from {} bars, holding", bars.len());
            return Ok(Signal::hold(symbol, timeframe, HoldReason::NoSequences));
        }

        let last = set
            .inputs
            .index_axis(Axis(0), set.len() - 1)
            .insert_axis(Axis(0))
            .to_owned();
        let probability = model.predict(&last)?[0];
        info!(
            "Signal for {} {}: p={:.4} threshold={}",
            symbol, timeframe, probability, INFERENCE_THRESHOLD
        );

        Ok(Signal::decision(
            symbol,
            timeframe,
            probability,
            INFERENCE_THRESHOLD,
        ))
    }
}
