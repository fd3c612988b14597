//! Recurrent binary direction classifier.
//!
//! A multi-layer LSTM encodes the feature window into its last hidden
//! state; a small feed-forward head maps that to a single sigmoid
//! probability of the next return being positive. Training minimizes
//! binary cross-entropy over shuffled mini-batches with a global
//! gradient-norm clip and Adam updates.

mod dense;
mod lstm;
mod optimizer;

use crate::domain::errors::PipelineError;
use anyhow::{Context, Result};
use dense::{Activation, Dense, DenseGrads};
use lstm::{LstmCell, LstmGrads, StepCache};
use ndarray::{Array1, Array3, ArrayView2, Axis};
use optimizer::Adam;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Width of the feed-forward head's hidden layer.
const HEAD_SIZE: usize = 32;
/// Global gradient-norm ceiling applied before every optimizer step.
const GRAD_CLIP_NORM: f64 = 1.0;
/// Keeps log() finite when a probability saturates.
const PROB_EPSILON: f64 = 1e-7;

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Fix for reproducible batch order; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 3,
            batch_size: 32,
            learning_rate: 7e-4,
            seed: None,
        }
    }
}

/// Training summary: the epoch-averaged loss of the final epoch.
#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub loss: f64,
    pub epochs: usize,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceClassifier {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    cells: Vec<LstmCell>,
    hidden_head: Dense,
    output_head: Dense,
}

/// Per-sample forward caches for backpropagation.
struct SampleCache {
    /// `[layer][step]`
    steps: Vec<Vec<StepCache>>,
    z_hidden: Array1<f64>,
    a_hidden: Array1<f64>,
    z_out: Array1<f64>,
    prob: f64,
}

struct ModelGrads {
    cells: Vec<LstmGrads>,
    hidden_head: DenseGrads,
    output_head: DenseGrads,
}

impl ModelGrads {
    fn zeros_like(model: &SequenceClassifier) -> Self {
        Self {
            cells: model.cells.iter().map(LstmGrads::zeros_like).collect(),
            hidden_head: DenseGrads::zeros_like(&model.hidden_head),
            output_head: DenseGrads::zeros_like(&model.output_head),
        }
    }

    fn scale(&mut self, factor: f64) {
        for cell in &mut self.cells {
            cell.scale(factor);
        }
        self.hidden_head.scale(factor);
        self.output_head.scale(factor);
    }

    fn squared_norm(&self) -> f64 {
        self.cells.iter().map(LstmGrads::squared_norm).sum::<f64>()
            + self.hidden_head.squared_norm()
            + self.output_head.squared_norm()
    }
}

impl SequenceClassifier {
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        rng: &mut impl Rng,
    ) -> Self {
        assert!(num_layers >= 1, "classifier needs at least one layer");
        let mut cells = Vec::with_capacity(num_layers);
        cells.push(LstmCell::new(input_size, hidden_size, rng));
        for _ in 1..num_layers {
            cells.push(LstmCell::new(hidden_size, hidden_size, rng));
        }

        Self {
            input_size,
            hidden_size,
            num_layers,
            cells,
            hidden_head: Dense::new(hidden_size, HEAD_SIZE, Activation::Relu, rng),
            output_head: Dense::new(HEAD_SIZE, 1, Activation::Linear, rng),
        }
    }

    fn forward_sample(&self, x: &ArrayView2<f64>) -> SampleCache {
        let seq_len = x.nrows();
        let mut steps: Vec<Vec<StepCache>> = (0..self.num_layers)
            .map(|_| Vec::with_capacity(seq_len))
            .collect();
        let mut states: Vec<(Array1<f64>, Array1<f64>)> =
            self.cells.iter().map(LstmCell::init_state).collect();

        for t in 0..seq_len {
            let mut input = x.row(t).to_owned();
            for (layer, cell) in self.cells.iter().enumerate() {
                let (h_prev, c_prev) = &states[layer];
                let cache = cell.forward_step(&input, h_prev, c_prev);
                input = cache.h.clone();
                states[layer] = (cache.h.clone(), cache.c.clone());
                steps[layer].push(cache);
            }
        }

        let last_hidden = &states[self.num_layers - 1].0;
        let (z_hidden, a_hidden) = self.hidden_head.forward(last_hidden);
        let (z_out, _) = self.output_head.forward(&a_hidden);
        let prob = 1.0 / (1.0 + (-z_out[0]).exp());

        SampleCache {
            steps,
            z_hidden,
            a_hidden,
            z_out,
            prob,
        }
    }

    /// Backpropagates one sample. `d_logit` is dL/d(pre-sigmoid logit),
    /// i.e. `(prob - label) / batch_size` for mean BCE.
    fn backward_sample(&self, cache: &SampleCache, d_logit: f64, grads: &mut ModelGrads) {
        let seq_len = cache.steps[0].len();
        let top = self.num_layers - 1;

        let d_out = Array1::from_elem(1, d_logit);
        let d_hidden = self.output_head.backward(
            &d_out,
            &cache.z_out,
            &cache.a_hidden,
            &mut grads.output_head,
        );
        let last_h = &cache.steps[top][seq_len - 1].h;
        let d_last_h = self.hidden_head.backward(
            &d_hidden,
            &cache.z_hidden,
            last_h,
            &mut grads.hidden_head,
        );

        // Recurrent carries per layer; the head seeds the top layer at
        // the final step.
        let mut dh: Vec<Array1<f64>> = (0..self.num_layers)
            .map(|_| Array1::zeros(self.hidden_size))
            .collect();
        let mut dc: Vec<Array1<f64>> = dh.clone();
        dh[top] = d_last_h;

        for t in (0..seq_len).rev() {
            let mut dx_down: Option<Array1<f64>> = None;
            for layer in (0..self.num_layers).rev() {
                let step = &cache.steps[layer][t];
                let mut dh_in = dh[layer].clone();
                if let Some(from_above) = dx_down.take() {
                    dh_in += &from_above;
                }

                let (dx, dh_prev, dc_prev) =
                    self.cells[layer].backward_step(step, &dh_in, &dc[layer], &mut grads.cells[layer]);
                dh[layer] = dh_prev;
                dc[layer] = dc_prev;
                dx_down = Some(dx);
            }
            // dx of layer 0 is the input gradient; nothing consumes it.
        }
    }

    /// Trains in place over `[n, seq_len, input_size]` inputs and `n`
    /// binary labels. With a fixed seed, batch order and therefore the
    /// final weights are reproducible.
    pub fn train(
        &mut self,
        inputs: &Array3<f64>,
        labels: &Array1<f64>,
        cfg: &TrainConfig,
    ) -> Result<TrainReport, PipelineError> {
        let n = inputs.shape()[0];
        if n == 0 {
            return Err(PipelineError::EmptyTrainingSet);
        }
        if inputs.shape()[2] != self.input_size {
            return Err(PipelineError::DimensionMismatch {
                expected: self.input_size,
                actual: inputs.shape()[2],
            });
        }
        if labels.len() != n {
            return Err(PipelineError::LabelMismatch {
                inputs: n,
                labels: labels.len(),
            });
        }

        let mut rng: StdRng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut opt = Adam::new(cfg.learning_rate);
        let mut m = ModelGrads::zeros_like(self);
        let mut v = ModelGrads::zeros_like(self);

        let batch_size = cfg.batch_size.clamp(1, n);
        let mut indices: Vec<usize> = (0..n).collect();
        let mut final_epoch_loss = 0.0;

        for epoch in 0..cfg.epochs {
            indices.shuffle(&mut rng);
            let mut total_loss = 0.0;

            for batch in indices.chunks(batch_size) {
                let mut grads = ModelGrads::zeros_like(self);

                for &idx in batch {
                    let x = inputs.index_axis(Axis(0), idx);
                    let cache = self.forward_sample(&x);
                    let y = labels[idx];

                    let p = cache.prob.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON);
                    total_loss += -(y * p.ln() + (1.0 - y) * (1.0 - p).ln());

                    let d_logit = (cache.prob - y) / batch.len() as f64;
                    self.backward_sample(&cache, d_logit, &mut grads);
                }

                let norm = grads.squared_norm().sqrt();
                if norm > GRAD_CLIP_NORM {
                    grads.scale(GRAD_CLIP_NORM / norm);
                }

                opt.begin_step();
                self.adam_step(&grads, &mut m, &mut v, &opt);
            }

            final_epoch_loss = total_loss / n as f64;
            debug!("epoch {} avg loss {:.6}", epoch + 1, final_epoch_loss);
        }

        Ok(TrainReport {
            loss: final_epoch_loss,
            epochs: cfg.epochs,
            samples: n,
        })
    }

    fn adam_step(&mut self, grads: &ModelGrads, m: &mut ModelGrads, v: &mut ModelGrads, opt: &Adam) {
        for (layer, cell) in self.cells.iter_mut().enumerate() {
            cell.adam_step(&grads.cells[layer], &mut m.cells[layer], &mut v.cells[layer], opt);
        }
        self.hidden_head
            .adam_step(&grads.hidden_head, &mut m.hidden_head, &mut v.hidden_head, opt);
        self.output_head
            .adam_step(&grads.output_head, &mut m.output_head, &mut v.output_head, opt);
    }

    /// Probabilities in [0, 1], one per input sequence.
    pub fn predict(&self, inputs: &Array3<f64>) -> Result<Array1<f64>, PipelineError> {
        if inputs.shape()[2] != self.input_size {
            return Err(PipelineError::DimensionMismatch {
                expected: self.input_size,
                actual: inputs.shape()[2],
            });
        }
        Ok((0..inputs.shape()[0])
            .map(|i| self.forward_sample(&inputs.index_axis(Axis(0), i)).prob)
            .collect())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("Failed to serialize model")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("Failed to deserialize model")
    }
}
