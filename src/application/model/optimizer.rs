//! Adaptive-moment gradient descent.
//!
//! One `Adam` instance drives a whole training run; the first/second
//! moment tensors live next to the gradients they smooth (the caller
//! keeps them in gradient-shaped mirrors of the parameters).

use ndarray::{Array, Dimension, Zip};

#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: usize,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
        }
    }

    /// Advances the step counter. Call once per optimizer step, before
    /// the per-tensor updates, so bias correction sees a consistent `t`.
    pub fn begin_step(&mut self) {
        self.t += 1;
    }

    /// In-place Adam update of one parameter tensor.
    pub fn update<D: Dimension>(
        &self,
        param: &mut Array<f64, D>,
        grad: &Array<f64, D>,
        m: &mut Array<f64, D>,
        v: &mut Array<f64, D>,
    ) {
        debug_assert!(self.t > 0, "begin_step must run before update");
        let (b1, b2) = (self.beta1, self.beta2);

        m.zip_mut_with(grad, |m, &g| *m = b1 * *m + (1.0 - b1) * g);
        v.zip_mut_with(grad, |v, &g| *v = b2 * *v + (1.0 - b2) * g * g);

        let c1 = 1.0 - b1.powi(self.t as i32);
        let c2 = 1.0 - b2.powi(self.t as i32);
        let lr = self.learning_rate;
        let eps = self.epsilon;

        Zip::from(&mut *param)
            .and(&*m)
            .and(&*v)
            .for_each(|p, &m, &v| {
                let m_hat = m / c1;
                let v_hat = v / c2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
    }
}
