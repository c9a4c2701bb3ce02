//! Best-effort unit detection for imported EEG
//!
//! Recorders disagree on units: some stream volts, many stream microvolts.
//! Data whose spread and range are both far larger than any plausible
//! voltage is assumed to be in microvolts and rescaled. Classification and
//! rescaling are separate steps so callers can inspect the decision.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Thresholds for [`classify`] and the factor used by [`apply`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleThresholds {
    /// Standard deviation above which data may be unscaled
    pub std_threshold: f64,
    /// Peak-to-peak range above which data may be unscaled
    pub amplitude_threshold: f64,
    /// Multiplier applied to rescaled data
    pub scale_factor: f64,
}

impl Default for ScaleThresholds {
    fn default() -> Self {
        Self {
            std_threshold: 1e-5,
            amplitude_threshold: 1.0,
            scale_factor: 1e-5,
        }
    }
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum ScaleClass {
    /// Values look like volts already
    AlreadyVolts,
    /// Values exceed both thresholds
    NeedsRescale {
        /// Population standard deviation
        std: f64,
        /// Max minus min
        peak_to_peak: f64,
    },
    /// NaN or infinite values present; never rescaled
    NonFinite,
}

/// Decide whether `data` needs rescaling.
#[must_use]
pub fn classify(data: ArrayView2<'_, f64>, thresholds: &ScaleThresholds) -> ScaleClass {
    if data.iter().any(|v| !v.is_finite()) {
        return ScaleClass::NonFinite;
    }
    if data.is_empty() {
        return ScaleClass::AlreadyVolts;
    }

    let std = data.std(0.0);
    let (min, max) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let peak_to_peak = max - min;

    if std > thresholds.std_threshold && peak_to_peak > thresholds.amplitude_threshold {
        ScaleClass::NeedsRescale { std, peak_to_peak }
    } else {
        ScaleClass::AlreadyVolts
    }
}

/// Rescale `data` in place if `class` says so. Returns whether it changed.
pub fn apply(data: &mut Array2<f64>, class: ScaleClass, thresholds: &ScaleThresholds) -> bool {
    match class {
        ScaleClass::NeedsRescale { .. } => {
            data.mapv_inplace(|v| v * thresholds.scale_factor);
            true
        }
        ScaleClass::AlreadyVolts | ScaleClass::NonFinite => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_microvolts_need_rescale() {
        let data = array![[-50.0, 50.0, -20.0], [10.0, 30.0, -40.0]];
        let class = classify(data.view(), &ScaleThresholds::default());
        match class {
            ScaleClass::NeedsRescale { peak_to_peak, .. } => assert_eq!(peak_to_peak, 100.0),
            other => panic!("unexpected class {other:?}"),
        }
    }

    #[test]
    fn test_volts_left_alone() {
        let data = array![[-5e-5, 5e-5], [2e-5, -1e-5]];
        assert_eq!(
            classify(data.view(), &ScaleThresholds::default()),
            ScaleClass::AlreadyVolts
        );
    }

    #[test]
    fn test_large_std_small_range_left_alone() {
        // std > 1e-5 but peak-to-peak below 1.0
        let data = array![[-0.3, 0.3]];
        assert_eq!(
            classify(data.view(), &ScaleThresholds::default()),
            ScaleClass::AlreadyVolts
        );
    }

    #[test]
    fn test_nan_guard() {
        let mut data = array![[f64::NAN, 100.0], [-100.0, 50.0]];
        let thresholds = ScaleThresholds::default();
        let class = classify(data.view(), &thresholds);
        assert_eq!(class, ScaleClass::NonFinite);
        assert!(!apply(&mut data, class, &thresholds));
        assert_eq!(data[[0, 1]], 100.0);
    }

    #[test]
    fn test_apply_multiplies_by_factor() {
        let mut data = array![[100.0, -100.0]];
        let thresholds = ScaleThresholds::default();
        let class = classify(data.view(), &thresholds);
        assert!(apply(&mut data, class, &thresholds));
        assert!((data[[0, 0]] - 1e-3).abs() < 1e-12);
        assert!((data[[0, 1]] + 1e-3).abs() < 1e-12);
    }

    #[test]
    fn test_apply_respects_class() {
        let mut data = array![[100.0, -100.0]];
        assert!(!apply(&mut data, ScaleClass::AlreadyVolts, &ScaleThresholds::default()));
        assert_eq!(data, array![[100.0, -100.0]]);
    }

    #[test]
    fn test_empty_data() {
        let data = Array2::<f64>::zeros((0, 4));
        assert_eq!(
            classify(data.view(), &ScaleThresholds::default()),
            ScaleClass::AlreadyVolts
        );
    }
}
