//! Fully connected layer for the classifier head.

use super::optimizer::Adam;
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Linear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    /// `[output, input]`
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
    pub activation: Activation,
}

impl Dense {
    pub fn new(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut impl Rng,
    ) -> Self {
        let limit = (1.0 / input_size as f64).sqrt();
        let mut weights = Array2::zeros((output_size, input_size));
        for w in weights.iter_mut() {
            *w = rng.random_range(-limit..limit);
        }
        Self {
            weights,
            biases: Array1::zeros(output_size),
            activation,
        }
    }

    /// Returns `(pre_activation, output)`; the pre-activation is cached
    /// for the backward pass.
    pub fn forward(&self, x: &Array1<f64>) -> (Array1<f64>, Array1<f64>) {
        let z = self.weights.dot(x) + &self.biases;
        let a = match self.activation {
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Linear => z.clone(),
        };
        (z, a)
    }

    /// Accumulates parameter gradients for one sample and returns
    /// dL/dx. `d_out` is dL/d(output), `z` the cached pre-activation,
    /// `x` the cached layer input.
    pub fn backward(
        &self,
        d_out: &Array1<f64>,
        z: &Array1<f64>,
        x: &Array1<f64>,
        grads: &mut DenseGrads,
    ) -> Array1<f64> {
        let dz = match self.activation {
            Activation::Relu => d_out * &z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Linear => d_out.clone(),
        };
        grads.weights += &outer(&dz, x);
        grads.biases += &dz;
        self.weights.t().dot(&dz)
    }

    pub fn adam_step(
        &mut self,
        grads: &DenseGrads,
        m: &mut DenseGrads,
        v: &mut DenseGrads,
        opt: &Adam,
    ) {
        opt.update(&mut self.weights, &grads.weights, &mut m.weights, &mut v.weights);
        opt.update(&mut self.biases, &grads.biases, &mut m.biases, &mut v.biases);
    }
}

/// Gradient (or moment) storage shaped like a `Dense` layer.
#[derive(Debug, Clone)]
pub struct DenseGrads {
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
}

impl DenseGrads {
    pub fn zeros_like(layer: &Dense) -> Self {
        Self {
            weights: Array2::zeros(layer.weights.raw_dim()),
            biases: Array1::zeros(layer.biases.raw_dim()),
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.weights.mapv_inplace(|v| v * factor);
        self.biases.mapv_inplace(|v| v * factor);
    }

    pub fn squared_norm(&self) -> f64 {
        self.weights.iter().map(|v| v * v).sum::<f64>()
            + self.biases.iter().map(|v| v * v).sum::<f64>()
    }
}

/// Outer product `a ⊗ b` as an `[a.len(), b.len()]` matrix.
pub(crate) fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    a.view()
        .insert_axis(Axis(1))
        .dot(&b.view().insert_axis(Axis(0)))
}
