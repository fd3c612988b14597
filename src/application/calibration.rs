//! Decision-threshold calibration.
//!
//! After training, the raw 0.5 cut is tuned against a scalar loss
//! (misclassification rate over the training predictions). Two search
//! strategies exist behind one trait: a coarse offset scan around the
//! initial threshold, and a golden-section line search over the full
//! admissible range.

pub const THRESHOLD_MIN: f64 = 0.3;
pub const THRESHOLD_MAX: f64 = 0.9;

/// Candidate shifts tried by the offset scan, in evaluation order.
const OFFSETS: [f64; 9] = [-0.2, -0.1, -0.05, -0.01, 0.0, 0.01, 0.05, 0.1, 0.2];

const GOLDEN_RATIO: f64 = 0.618_033_988_749_895;

/// Bounded scalar search over candidate thresholds. The loss closure
/// must be cheap; strategies may call it `steps` times or more.
pub trait ThresholdSearch {
    fn search(&self, initial: f64, loss: &mut dyn FnMut(f64) -> f64, steps: usize) -> f64;
}

/// Evaluates fixed offsets around the initial threshold, clamped to the
/// admissible range, and keeps the best. Ties keep the earlier
/// candidate, so an unimprovable initial threshold survives unchanged.
pub struct OffsetScan;

impl ThresholdSearch for OffsetScan {
    fn search(&self, initial: f64, loss: &mut dyn FnMut(f64) -> f64, _steps: usize) -> f64 {
        let mut best = initial;
        let mut best_loss = loss(initial);

        for offset in OFFSETS {
            let candidate = (initial + offset).clamp(THRESHOLD_MIN, THRESHOLD_MAX);
            let candidate_loss = loss(candidate);
            if candidate_loss < best_loss {
                best = candidate;
                best_loss = candidate_loss;
            }
        }
        best
    }
}

/// Golden-section search over the whole admissible range. Ignores the
/// initial threshold except as a fallback when it already wins.
pub struct GoldenSection;

impl ThresholdSearch for GoldenSection {
    fn search(&self, initial: f64, loss: &mut dyn FnMut(f64) -> f64, steps: usize) -> f64 {
        let mut lo = THRESHOLD_MIN;
        let mut hi = THRESHOLD_MAX;
        let mut a = hi - GOLDEN_RATIO * (hi - lo);
        let mut b = lo + GOLDEN_RATIO * (hi - lo);
        let mut loss_a = loss(a);
        let mut loss_b = loss(b);

        for _ in 0..steps {
            if loss_a <= loss_b {
                hi = b;
                b = a;
                loss_b = loss_a;
                a = hi - GOLDEN_RATIO * (hi - lo);
                loss_a = loss(a);
            } else {
                lo = a;
                a = b;
                loss_a = loss_b;
                b = lo + GOLDEN_RATIO * (hi - lo);
                loss_b = loss(b);
            }
        }

        let found = (lo + hi) / 2.0;
        if loss(found) <= loss(initial) {
            found
        } else {
            initial
        }
    }
}

pub struct ThresholdCalibrator {
    strategy: Box<dyn ThresholdSearch + Send + Sync>,
}

impl ThresholdCalibrator {
    pub fn from_config(variational: bool) -> Self {
        let strategy: Box<dyn ThresholdSearch + Send + Sync> = if variational {
            Box::new(GoldenSection)
        } else {
            Box::new(OffsetScan)
        };
        Self { strategy }
    }

    /// Returns a threshold in `[THRESHOLD_MIN, THRESHOLD_MAX]` with loss
    /// no worse than the (clamped) initial threshold's.
    pub fn calibrate(
        &self,
        initial: f64,
        loss: &mut dyn FnMut(f64) -> f64,
        steps: usize,
    ) -> f64 {
        let initial = initial.clamp(THRESHOLD_MIN, THRESHOLD_MAX);
        self.strategy
            .search(initial, loss, steps)
            .clamp(THRESHOLD_MIN, THRESHOLD_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_scan_never_leaves_the_range() {
        let calibrator = ThresholdCalibrator::from_config(false);
        let mut loss = |t: f64| t; // lower is better, pushes toward the floor
        let result = calibrator.calibrate(0.5, &mut loss, 40);
        assert!((THRESHOLD_MIN..=THRESHOLD_MAX).contains(&result));
        assert_eq!(result, THRESHOLD_MIN);
    }

    #[test]
    fn tie_keeps_the_initial_threshold() {
        let calibrator = ThresholdCalibrator::from_config(false);
        let mut loss = |_: f64| 0.25; // flat landscape
        assert_eq!(calibrator.calibrate(0.5, &mut loss, 40), 0.5);
    }

    #[test]
    fn out_of_range_initial_is_clamped_first() {
        let calibrator = ThresholdCalibrator::from_config(false);
        let mut loss = |_: f64| 1.0;
        assert_eq!(calibrator.calibrate(0.05, &mut loss, 40), THRESHOLD_MIN);
        assert_eq!(calibrator.calibrate(0.99, &mut loss, 40), THRESHOLD_MAX);
    }

    #[test]
    fn calibration_never_worsens_the_loss() {
        for variational in [false, true] {
            let calibrator = ThresholdCalibrator::from_config(variational);
            let mut loss = |t: f64| (t - 0.62).powi(2);
            let result = calibrator.calibrate(0.5, &mut loss, 40);
            assert!(loss(result) <= loss(0.5) + 1e-12);
        }
    }

    #[test]
    fn golden_section_finds_a_parabolic_minimum() {
        let calibrator = ThresholdCalibrator::from_config(true);
        let mut loss = |t: f64| (t - 0.62).powi(2);
        let result = calibrator.calibrate(0.5, &mut loss, 40);
        assert!((result - 0.62).abs() < 1e-3, "found {result}");
    }
}
