//! End-to-end pipeline tests against in-memory adapters.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use titan::application::model::SequenceClassifier;
use titan::application::signal::SignalService;
use titan::application::training::{TrainingOrchestrator, TrainingOutcome};
use titan::config::Config;
use titan::domain::market::{Bar, FEATURE_DIM};
use titan::domain::ports::{
    EmbeddingProvider, EmbeddingRow, MarketDataSource, ModelArtifactStore, VectorStore,
    EMBEDDING_DIM,
};
use titan::domain::signal::{Direction, HoldReason};
use tokio::sync::Mutex;

struct ScriptedMarketDataSource {
    bars: Vec<Bar>,
    delay: Option<Duration>,
}

impl ScriptedMarketDataSource {
    fn new(bars: Vec<Bar>) -> Self {
        Self { bars, delay: None }
    }

    fn slow(bars: Vec<Bar>, delay: Duration) -> Self {
        Self {
            bars,
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl MarketDataSource for ScriptedMarketDataSource {
    async fn fetch_page(
        &self,
        _symbol: &str,
        _timeframe: &str,
        since: i64,
        limit: usize,
    ) -> Result<Vec<Bar>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .bars
            .iter()
            .filter(|b| b.timestamp >= since)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct InMemoryArtifactStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

#[async_trait]
impl ModelArtifactStore for InMemoryArtifactStore {
    async fn write(&self, bytes: &[u8]) -> Result<()> {
        *self.bytes.lock().await = Some(bytes.to_vec());
        Ok(())
    }

    async fn read(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.bytes.lock().await.clone())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

struct ZeroEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for ZeroEmbeddingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; EMBEDDING_DIM])
    }
}

#[derive(Default)]
struct RecordingVectorStore {
    rows: Mutex<Vec<EmbeddingRow>>,
}

#[async_trait]
impl VectorStore for RecordingVectorStore {
    async fn upsert(&self, row: &EmbeddingRow) -> Result<()> {
        self.rows.lock().await.push(row.clone());
        Ok(())
    }
}

/// Hourly bars ending now, close prices from `price`.
fn hourly_bars(count: usize, price: impl Fn(usize) -> f64) -> Vec<Bar> {
    let dec = |v: f64| Decimal::from_f64(v).unwrap();
    let end = Utc::now().timestamp_millis();
    (0..count)
        .map(|i| {
            let close = price(i);
            let open = if i == 0 { close } else { price(i - 1) };
            Bar {
                timestamp: end - ((count - 1 - i) as i64) * 3_600_000,
                open: dec(open),
                high: dec(open.max(close) + 0.5),
                low: dec(open.min(close) - 0.5),
                close: dec(close),
                volume: dec(50.0 + (i % 7) as f64),
            }
        })
        .collect()
}

fn wavy(i: usize) -> f64 {
    100.0 + 10.0 * (i as f64 / 6.0).sin() + 0.3 * (i % 3) as f64
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.hidden_size = 8;
    config.num_layers = 1;
    config.train_epochs = 2;
    config.train_seed = Some(3);
    config
}

fn orchestrator_with(
    bars: Vec<Bar>,
) -> (
    TrainingOrchestrator,
    Arc<InMemoryArtifactStore>,
    Arc<RecordingVectorStore>,
) {
    let artifacts = Arc::new(InMemoryArtifactStore::default());
    let vectors = Arc::new(RecordingVectorStore::default());
    let orchestrator = TrainingOrchestrator::new(
        test_config(),
        Arc::new(ScriptedMarketDataSource::new(bars)),
        artifacts.clone(),
        Arc::new(ZeroEmbeddingProvider),
        vectors.clone(),
    );
    (orchestrator, artifacts, vectors)
}

#[tokio::test]
async fn training_reports_not_enough_data() {
    // 50 bars -> 49 feature rows -> 18 sequences, below the 100 floor.
    let (orchestrator, artifacts, vectors) = orchestrator_with(hourly_bars(50, wavy));

    let outcome = orchestrator.run_training().await.unwrap();
    match outcome {
        TrainingOutcome::NotEnoughData { sequences } => assert_eq!(sequences, 18),
        other => panic!("expected NotEnoughData, got {other:?}"),
    }
    assert!(artifacts.read().await.unwrap().is_none());
    assert!(vectors.rows.lock().await.is_empty());
}

#[tokio::test]
async fn training_completes_end_to_end() {
    // 200 bars -> 199 feature rows -> 168 sequences.
    let (orchestrator, artifacts, vectors) = orchestrator_with(hourly_bars(200, wavy));

    let outcome = orchestrator.run_training().await.unwrap();
    let summary = match outcome {
        TrainingOutcome::Completed(summary) => summary,
        other => panic!("expected Completed, got {other:?}"),
    };

    assert!((0.3..=0.9).contains(&summary.threshold));
    assert!(summary.loss.is_finite());
    assert_eq!(summary.artifact, "memory");

    let bytes = artifacts.read().await.unwrap().expect("artifact written");
    SequenceClassifier::from_bytes(&bytes).expect("artifact deserializes");

    let rows = vectors.rows.lock().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].embedding.len(), EMBEDDING_DIM);
    assert!(rows[0].text.starts_with("Symbol=BTC/USDT tf=1h"));
}

#[tokio::test]
async fn concurrent_runs_are_mutually_exclusive() {
    let bars = hourly_bars(10, wavy);
    let artifacts = Arc::new(InMemoryArtifactStore::default());
    let orchestrator = TrainingOrchestrator::new(
        test_config(),
        Arc::new(ScriptedMarketDataSource::slow(bars, Duration::from_millis(50))),
        artifacts,
        Arc::new(ZeroEmbeddingProvider),
        Arc::new(RecordingVectorStore::default()),
    );

    let (first, second) = tokio::join!(orchestrator.run_training(), orchestrator.run_training());
    let outcomes = [first.unwrap(), second.unwrap()];
    let rejected = outcomes
        .iter()
        .filter(|o| matches!(o, TrainingOutcome::AlreadyRunning))
        .count();
    assert_eq!(rejected, 1, "exactly one run must be rejected: {outcomes:?}");
}

#[tokio::test]
async fn signal_holds_without_a_model() {
    let service = SignalService::new(
        test_config(),
        Arc::new(ScriptedMarketDataSource::new(hourly_bars(200, wavy))),
        Arc::new(InMemoryArtifactStore::default()),
    );

    let signal = service.generate_signal(None, None).await.unwrap();
    assert_eq!(signal.direction, Direction::Hold);
    assert_eq!(signal.reason, Some(HoldReason::ModelUnavailable));
    assert!(signal.probability.is_none());
}

#[tokio::test]
async fn signal_holds_on_short_history() {
    let artifacts = Arc::new(InMemoryArtifactStore::default());
    let model = SequenceClassifier::new(FEATURE_DIM, 8, 1, &mut StdRng::seed_from_u64(1));
    artifacts.write(&model.to_bytes().unwrap()).await.unwrap();

    let service = SignalService::new(
        test_config(),
        Arc::new(ScriptedMarketDataSource::new(hourly_bars(10, wavy))),
        artifacts,
    );

    let signal = service.generate_signal(None, None).await.unwrap();
    assert_eq!(signal.direction, Direction::Hold);
    assert_eq!(signal.reason, Some(HoldReason::NoSequences));
}

#[tokio::test]
async fn signal_scores_the_latest_window() {
    let artifacts = Arc::new(InMemoryArtifactStore::default());
    let model = SequenceClassifier::new(FEATURE_DIM, 8, 1, &mut StdRng::seed_from_u64(1));
    artifacts.write(&model.to_bytes().unwrap()).await.unwrap();

    let service = SignalService::new(
        test_config(),
        Arc::new(ScriptedMarketDataSource::new(hourly_bars(200, wavy))),
        artifacts,
    );

    let signal = service
        .generate_signal(Some("ETH/USDT"), Some("1h"))
        .await
        .unwrap();

    assert_eq!(signal.symbol, "ETH/USDT");
    assert_ne!(signal.direction, Direction::Hold);
    assert_eq!(signal.threshold, Some(0.5));
    let p = signal.probability.expect("probability set");
    assert!((0.0..=1.0).contains(&p));
}

#[tokio::test]
async fn corrupt_artifact_is_an_error_not_a_hold() {
    let artifacts = Arc::new(InMemoryArtifactStore::default());
    artifacts.write(b"not a model").await.unwrap();

    let service = SignalService::new(
        test_config(),
        Arc::new(ScriptedMarketDataSource::new(hourly_bars(200, wavy))),
        artifacts,
    );

    assert!(service.generate_signal(None, None).await.is_err());
}
