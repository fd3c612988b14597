//! Sequence Builder
//!
//! Slides a fixed-length window over the feature table and pairs each
//! window with a binary label: the sign of the realized return in the
//! row immediately after the window.

use crate::domain::market::{FEATURE_DIM, FeatureRow};
use ndarray::{Array1, Array3};

#[derive(Debug, Clone)]
pub struct SequenceSet {
    /// `[sequence, step, feature]`
    pub inputs: Array3<f64>,
    pub labels: Array1<f64>,
}

impl SequenceSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Builds `(input, label)` pairs.
///
/// The label column is the forward-shifted return, computed once over
/// the whole table: `fwd[j] = ret[j+1]`, zero at the final row. Label
/// `i` is 1.0 iff `fwd[i + window_length] > 0`. A window therefore
/// never contains the row that generates its own label.
///
/// Yields exactly `max(0, n - window_length - 1)` sequences; a table
/// with `n <= window_length + 1` rows produces the empty set.
pub fn build_sequences(features: &[FeatureRow], window_length: usize) -> SequenceSet {
    let n = features.len();
    let count = n.saturating_sub(window_length + 1);

    let mut inputs = Array3::zeros((count, window_length, FEATURE_DIM));
    let mut labels = Array1::zeros(count);
    if count == 0 {
        return SequenceSet { inputs, labels };
    }

    let mut fwd = vec![0.0; n];
    for j in 0..n - 1 {
        fwd[j] = features[j + 1].ret;
    }

    for i in 0..count {
        for (t, row) in features[i..i + window_length].iter().enumerate() {
            for (k, value) in row.as_input().into_iter().enumerate() {
                inputs[[i, t, k]] = value;
            }
        }
        labels[i] = if fwd[i + window_length] > 0.0 { 1.0 } else { 0.0 };
    }

    SequenceSet { inputs, labels }
}
