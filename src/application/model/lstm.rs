//! LSTM cell with analytic backpropagation through time.

use super::dense::outer;
use super::optimizer::Adam;
use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One LSTM layer. Gate weights are kept explicit: `w_x?` maps the
/// layer input, `w_h?` the previous hidden state, for the input (`i`),
/// forget (`f`), cell-candidate (`g`) and output (`o`) gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmCell {
    pub input_size: usize,
    pub hidden_size: usize,

    w_xi: Array2<f64>,
    w_hi: Array2<f64>,
    b_i: Array1<f64>,

    w_xf: Array2<f64>,
    w_hf: Array2<f64>,
    b_f: Array1<f64>,

    w_xg: Array2<f64>,
    w_hg: Array2<f64>,
    b_g: Array1<f64>,

    w_xo: Array2<f64>,
    w_ho: Array2<f64>,
    b_o: Array1<f64>,
}

/// Everything the backward pass needs from one forward step.
#[derive(Debug, Clone)]
pub struct StepCache {
    pub x: Array1<f64>,
    pub h_prev: Array1<f64>,
    pub c_prev: Array1<f64>,
    pub i: Array1<f64>,
    pub f: Array1<f64>,
    pub g: Array1<f64>,
    pub o: Array1<f64>,
    pub c: Array1<f64>,
    pub h: Array1<f64>,
}

impl LstmCell {
    pub fn new(input_size: usize, hidden_size: usize, rng: &mut impl Rng) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();
        let mut mat = |rows: usize, cols: usize| {
            let mut w = Array2::zeros((rows, cols));
            for v in w.iter_mut() {
                *v = rng.random_range(-limit..limit);
            }
            w
        };
        let (h, d) = (hidden_size, input_size);

        Self {
            input_size,
            hidden_size,
            w_xi: mat(h, d),
            w_hi: mat(h, h),
            b_i: Array1::zeros(h),
            w_xf: mat(h, d),
            w_hf: mat(h, h),
            // Forget bias starts at 1 so early training keeps state.
            b_f: Array1::from_elem(h, 1.0),
            w_xg: mat(h, d),
            w_hg: mat(h, h),
            b_g: Array1::zeros(h),
            w_xo: mat(h, d),
            w_ho: mat(h, h),
            b_o: Array1::zeros(h),
        }
    }

    pub fn init_state(&self) -> (Array1<f64>, Array1<f64>) {
        (Array1::zeros(self.hidden_size), Array1::zeros(self.hidden_size))
    }

    pub fn forward_step(
        &self,
        x: &Array1<f64>,
        h_prev: &Array1<f64>,
        c_prev: &Array1<f64>,
    ) -> StepCache {
        let i = sigmoid(self.w_xi.dot(x) + self.w_hi.dot(h_prev) + &self.b_i);
        let f = sigmoid(self.w_xf.dot(x) + self.w_hf.dot(h_prev) + &self.b_f);
        let g = (self.w_xg.dot(x) + self.w_hg.dot(h_prev) + &self.b_g).mapv(f64::tanh);
        let o = sigmoid(self.w_xo.dot(x) + self.w_ho.dot(h_prev) + &self.b_o);

        let c = &f * c_prev + &i * &g;
        let h = &o * &c.mapv(f64::tanh);

        StepCache {
            x: x.clone(),
            h_prev: h_prev.clone(),
            c_prev: c_prev.clone(),
            i,
            f,
            g,
            o,
            c,
            h,
        }
    }

    /// One BPTT step. `dh` and `dc_in` are the gradients flowing into
    /// this step's hidden and cell state (from the layer above, the
    /// head, and the step at `t + 1`). Accumulates parameter gradients
    /// into `grads` and returns `(dx, dh_prev, dc_prev)`.
    pub fn backward_step(
        &self,
        cache: &StepCache,
        dh: &Array1<f64>,
        dc_in: &Array1<f64>,
        grads: &mut LstmGrads,
    ) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
        let tanh_c = cache.c.mapv(f64::tanh);

        let d_o = dh * &tanh_c;
        let dc = dc_in + &(dh * &cache.o * &tanh_c.mapv(|v| 1.0 - v * v));

        let d_i = &dc * &cache.g;
        let d_g = &dc * &cache.i;
        let d_f = &dc * &cache.c_prev;
        let dc_prev = &dc * &cache.f;

        // Pre-activation gradients: σ'(z) = σ(1-σ), tanh'(z) = 1-tanh².
        let dz_i = &d_i * &cache.i * &cache.i.mapv(|v| 1.0 - v);
        let dz_f = &d_f * &cache.f * &cache.f.mapv(|v| 1.0 - v);
        let dz_g = &d_g * &cache.g.mapv(|v| 1.0 - v * v);
        let dz_o = &d_o * &cache.o * &cache.o.mapv(|v| 1.0 - v);

        grads.w_xi += &outer(&dz_i, &cache.x);
        grads.w_hi += &outer(&dz_i, &cache.h_prev);
        grads.b_i += &dz_i;

        grads.w_xf += &outer(&dz_f, &cache.x);
        grads.w_hf += &outer(&dz_f, &cache.h_prev);
        grads.b_f += &dz_f;

        grads.w_xg += &outer(&dz_g, &cache.x);
        grads.w_hg += &outer(&dz_g, &cache.h_prev);
        grads.b_g += &dz_g;

        grads.w_xo += &outer(&dz_o, &cache.x);
        grads.w_ho += &outer(&dz_o, &cache.h_prev);
        grads.b_o += &dz_o;

        let dx = self.w_xi.t().dot(&dz_i)
            + self.w_xf.t().dot(&dz_f)
            + self.w_xg.t().dot(&dz_g)
            + self.w_xo.t().dot(&dz_o);
        let dh_prev = self.w_hi.t().dot(&dz_i)
            + self.w_hf.t().dot(&dz_f)
            + self.w_hg.t().dot(&dz_g)
            + self.w_ho.t().dot(&dz_o);

        (dx, dh_prev, dc_prev)
    }

    pub fn adam_step(
        &mut self,
        grads: &LstmGrads,
        m: &mut LstmGrads,
        v: &mut LstmGrads,
        opt: &Adam,
    ) {
        opt.update(&mut self.w_xi, &grads.w_xi, &mut m.w_xi, &mut v.w_xi);
        opt.update(&mut self.w_hi, &grads.w_hi, &mut m.w_hi, &mut v.w_hi);
        opt.update(&mut self.b_i, &grads.b_i, &mut m.b_i, &mut v.b_i);

        opt.update(&mut self.w_xf, &grads.w_xf, &mut m.w_xf, &mut v.w_xf);
        opt.update(&mut self.w_hf, &grads.w_hf, &mut m.w_hf, &mut v.w_hf);
        opt.update(&mut self.b_f, &grads.b_f, &mut m.b_f, &mut v.b_f);

        opt.update(&mut self.w_xg, &grads.w_xg, &mut m.w_xg, &mut v.w_xg);
        opt.update(&mut self.w_hg, &grads.w_hg, &mut m.w_hg, &mut v.w_hg);
        opt.update(&mut self.b_g, &grads.b_g, &mut m.b_g, &mut v.b_g);

        opt.update(&mut self.w_xo, &grads.w_xo, &mut m.w_xo, &mut v.w_xo);
        opt.update(&mut self.w_ho, &grads.w_ho, &mut m.w_ho, &mut v.w_ho);
        opt.update(&mut self.b_o, &grads.b_o, &mut m.b_o, &mut v.b_o);
    }
}

/// Gradient (or moment) storage shaped like an `LstmCell`.
#[derive(Debug, Clone)]
pub struct LstmGrads {
    w_xi: Array2<f64>,
    w_hi: Array2<f64>,
    b_i: Array1<f64>,
    w_xf: Array2<f64>,
    w_hf: Array2<f64>,
    b_f: Array1<f64>,
    w_xg: Array2<f64>,
    w_hg: Array2<f64>,
    b_g: Array1<f64>,
    w_xo: Array2<f64>,
    w_ho: Array2<f64>,
    b_o: Array1<f64>,
}

impl LstmGrads {
    pub fn zeros_like(cell: &LstmCell) -> Self {
        let (h, d) = (cell.hidden_size, cell.input_size);
        Self {
            w_xi: Array2::zeros((h, d)),
            w_hi: Array2::zeros((h, h)),
            b_i: Array1::zeros(h),
            w_xf: Array2::zeros((h, d)),
            w_hf: Array2::zeros((h, h)),
            b_f: Array1::zeros(h),
            w_xg: Array2::zeros((h, d)),
            w_hg: Array2::zeros((h, h)),
            b_g: Array1::zeros(h),
            w_xo: Array2::zeros((h, d)),
            w_ho: Array2::zeros((h, h)),
            b_o: Array1::zeros(h),
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for w in [
            &mut self.w_xi,
            &mut self.w_hi,
            &mut self.w_xf,
            &mut self.w_hf,
            &mut self.w_xg,
            &mut self.w_hg,
            &mut self.w_xo,
            &mut self.w_ho,
        ] {
            w.mapv_inplace(|v| v * factor);
        }
        for b in [&mut self.b_i, &mut self.b_f, &mut self.b_g, &mut self.b_o] {
            b.mapv_inplace(|v| v * factor);
        }
    }

    pub fn squared_norm(&self) -> f64 {
        let mats = [
            &self.w_xi, &self.w_hi, &self.w_xf, &self.w_hf, &self.w_xg, &self.w_hg, &self.w_xo,
            &self.w_ho,
        ];
        let vecs = [&self.b_i, &self.b_f, &self.b_g, &self.b_o];
        mats.iter()
            .map(|w| w.iter().map(|v| v * v).sum::<f64>())
            .sum::<f64>()
            + vecs
                .iter()
                .map(|b| b.iter().map(|v| v * v).sum::<f64>())
                .sum::<f64>()
    }
}

fn sigmoid(z: Array1<f64>) -> Array1<f64> {
    z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn forward_step_shapes_and_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let cell = LstmCell::new(5, 8, &mut rng);
        let (h, c) = cell.init_state();
        let x = Array1::from_elem(5, 0.4);

        let cache = cell.forward_step(&x, &h, &c);

        assert_eq!(cache.h.len(), 8);
        assert_eq!(cache.c.len(), 8);
        // Gates are sigmoid outputs, candidate is tanh.
        assert!(cache.i.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(cache.f.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(cache.g.iter().all(|&v| (-1.0..=1.0).contains(&v)));
        assert!(cache.h.iter().all(|&v| (-1.0..=1.0).contains(&v)));
    }

    #[test]
    fn backward_step_matches_finite_differences() {
        // Scalar loss L = sum(h); checks dL/dw_xi numerically through
        // one full cell step.
        let mut rng = StdRng::seed_from_u64(4);
        let cell = LstmCell::new(3, 4, &mut rng);
        let (h0, c0) = cell.init_state();
        let x = Array1::from_vec(vec![0.3, -0.7, 0.2]);

        let cache = cell.forward_step(&x, &h0, &c0);
        let dh = Array1::ones(4);
        let dc = Array1::zeros(4);
        let mut grads = LstmGrads::zeros_like(&cell);
        cell.backward_step(&cache, &dh, &dc, &mut grads);

        let eps = 1e-6;
        let mut perturbed = cell.clone();
        perturbed.w_xi[[1, 2]] += eps;
        let plus = perturbed.forward_step(&x, &h0, &c0).h.sum();
        perturbed.w_xi[[1, 2]] -= 2.0 * eps;
        let minus = perturbed.forward_step(&x, &h0, &c0).h.sum();
        let numeric = (plus - minus) / (2.0 * eps);

        assert!((grads.w_xi[[1, 2]] - numeric).abs() < 1e-5);
    }

    #[test]
    fn clip_scaling_shrinks_the_norm() {
        let mut rng = StdRng::seed_from_u64(5);
        let cell = LstmCell::new(2, 3, &mut rng);
        let (h0, c0) = cell.init_state();
        let cache = cell.forward_step(&Array1::from_elem(2, 1.0), &h0, &c0);

        let mut grads = LstmGrads::zeros_like(&cell);
        cell.backward_step(&cache, &Array1::ones(3), &Array1::zeros(3), &mut grads);

        let norm = grads.squared_norm().sqrt();
        assert!(norm > 0.0);
        grads.scale(0.5);
        assert!((grads.squared_norm().sqrt() - 0.5 * norm).abs() < 1e-12);
    }
}
